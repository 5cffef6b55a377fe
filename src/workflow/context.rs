//! Session Context
//!
//! The single record of named fields threaded through every step of a
//! session. Steps never mutate it directly: each step returns a
//! [`ContextPatch`] which the engine merges with insert-or-overwrite
//! semantics. There is no removal operation, so fields written by an
//! earlier step stay readable by every later one.
//!
//! Absent fields read as an empty default (`""`, `false`, `0`, `[]`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known context field names.
pub mod fields {
    pub const PROMPT: &str = "prompt";
    pub const DEMO_DESCRIPTION: &str = "demo_description";
    pub const QUESTIONS: &str = "questions";
    pub const PRESENTATION: &str = "presentation";
    pub const HUMAN_INPUT: &str = "human_input";
    pub const APPROVED: &str = "approved";
    pub const APPROVAL_ROUNDS: &str = "approval_rounds";
    pub const SCRIPT: &str = "script";
    pub const SCHEMA: &str = "schema";
    pub const AGENT_NAME: &str = "agent_name";
    pub const ARTIFACTS: &str = "artifacts";
    pub const FAILURE_DETAIL: &str = "failure_detail";
    pub const REPAIR_ATTEMPTS: &str = "repair_attempts";
    pub const DOCUMENTS: &str = "documents";
    pub const DOCUMENTS_FILE: &str = "documents_file";
    pub const TABLE_INFO: &str = "table_info";
    pub const SEMANTIC_MODEL_YAML: &str = "semantic_model_yaml";
    pub const SEMANTIC_MODEL_PATH: &str = "semantic_model_path";
    pub const SEARCH_SERVICE_PATH: &str = "search_service_path";
    pub const AGENT_DESCRIPTION: &str = "agent_description";
    pub const SAMPLE_QUESTIONS: &str = "sample_questions";
    pub const AGENT_RECORD: &str = "agent_record";
    pub const FINAL_RESPONSE: &str = "final_response";
}

/// Accumulated state of one session.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Context {
    fields: Map<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with the initial demo prompt.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        let mut context = Self::new();
        context.apply(ContextPatch::new().set(fields::PROMPT, prompt.into()));
        context
    }

    /// Returns the raw value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns true if the field has been written.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Reads a string field, or `""` when absent.
    pub fn get_str(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Reads a boolean field, or `false` when absent.
    pub fn get_bool(&self, key: &str) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Reads a counter field, or `0` when absent.
    pub fn get_u32(&self, key: &str) -> u32 {
        self.fields
            .get(key)
            .and_then(Value::as_u64)
            .map(|n| n.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(0)
    }

    /// Reads a list of strings, skipping non-string entries.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Deserializes a structured field. Returns `None` when absent or mistyped.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The most recent script execution error, or `""`.
    pub fn failure_detail(&self) -> &str {
        self.get_str(fields::FAILURE_DETAIL)
    }

    /// Returns true if the most recent execution attempt failed.
    pub fn has_failure(&self) -> bool {
        !self.failure_detail().is_empty()
    }

    /// Copies the listed fields that are present into a new map.
    pub fn select(&self, keys: &[&str]) -> Map<String, Value> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// Merges a step result. Existing fields not named in the patch are kept.
    pub fn apply(&mut self, patch: ContextPatch) {
        for (key, value) in patch.fields {
            self.fields.insert(key, value);
        }
    }

    /// Iterates over field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The fields a step produced, to be merged into the [`Context`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextPatch {
    fields: Map<String, Value>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field in the patch.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Sets a field from any serializable value.
    pub fn set_serialized<T: Serialize>(self, key: &str, value: &T) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        Ok(self.set(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_fields_read_as_defaults() {
        let context = Context::new();

        assert_eq!(context.get_str(fields::SCRIPT), "");
        assert!(!context.get_bool(fields::APPROVED));
        assert_eq!(context.get_u32(fields::REPAIR_ATTEMPTS), 0);
        assert!(context.get_strings(fields::ARTIFACTS).is_empty());
        assert!(!context.has_failure());
    }

    #[test]
    fn test_with_prompt_seeds_prompt() {
        let context = Context::with_prompt("build a retail demo");
        assert_eq!(context.get_str(fields::PROMPT), "build a retail demo");
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_apply_keeps_unrelated_fields() {
        let mut context = Context::with_prompt("p");
        context.apply(ContextPatch::new().set(fields::SCRIPT, "v1"));
        context.apply(ContextPatch::new().set(fields::SCRIPT, "v2").set(fields::SCHEMA, "S"));

        assert_eq!(context.get_str(fields::PROMPT), "p");
        assert_eq!(context.get_str(fields::SCRIPT), "v2");
        assert_eq!(context.get_str(fields::SCHEMA), "S");
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn test_failure_detail_tracking() {
        let mut context = Context::new();
        context.apply(ContextPatch::new().set(fields::FAILURE_DETAIL, "KeyError: CUSTOMER_ID"));
        assert!(context.has_failure());

        context.apply(ContextPatch::new().set(fields::FAILURE_DETAIL, ""));
        assert!(!context.has_failure());
        assert!(context.contains(fields::FAILURE_DETAIL));
    }

    #[test]
    fn test_any_failure_detail_is_a_failure() {
        let mut context = Context::new();
        context.apply(ContextPatch::new().set(fields::FAILURE_DETAIL, "  \n"));
        assert!(context.has_failure());
    }

    #[test]
    fn test_get_strings_skips_non_strings() {
        let mut context = Context::new();
        context.apply(ContextPatch::new().set(fields::QUESTIONS, json!(["a", 1, "b", null])));

        assert_eq!(context.get_strings(fields::QUESTIONS), vec!["a", "b"]);
    }

    #[test]
    fn test_mistyped_fields_read_as_defaults() {
        let mut context = Context::new();
        context.apply(
            ContextPatch::new()
                .set(fields::APPROVED, "yes")
                .set(fields::SCRIPT, 42)
                .set(fields::REPAIR_ATTEMPTS, -1),
        );

        assert!(!context.get_bool(fields::APPROVED));
        assert_eq!(context.get_str(fields::SCRIPT), "");
        assert_eq!(context.get_u32(fields::REPAIR_ATTEMPTS), 0);
    }

    #[test]
    fn test_select_only_present_fields() {
        let mut context = Context::with_prompt("p");
        context.apply(ContextPatch::new().set(fields::SCHEMA, "RETAIL"));

        let selected = context.select(&[fields::PROMPT, fields::SCHEMA, fields::SCRIPT]);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.get(fields::SCHEMA), Some(&json!("RETAIL")));
    }

    #[test]
    fn test_structured_field_roundtrip() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Doc {
            title: String,
        }

        let docs = vec![Doc { title: "Returns".to_string() }];
        let patch = ContextPatch::new().set_serialized(fields::DOCUMENTS, &docs).unwrap();
        let mut context = Context::new();
        context.apply(patch);

        let loaded: Vec<Doc> = context.get_as(fields::DOCUMENTS).unwrap();
        assert_eq!(loaded, docs);
        assert!(context.get_as::<Vec<Doc>>(fields::PROMPT).is_none());
    }

    #[test]
    fn test_context_serializes_as_plain_object() {
        let context = Context::with_prompt("p");
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json, json!({"prompt": "p"}));

        let back: Context = serde_json::from_value(json).unwrap();
        assert_eq!(back, context);
    }
}
