//! Loading generated data and publishing it to the warehouse.

use std::fs;
use std::path::Path;

use log::{info, warn};

use super::documents::DOCUMENTS_FILE;
use super::StepServices;
use crate::error::StepError;
use crate::execution::script::strip_code_fence;
use crate::warehouse::TableInfo;
use crate::workflow::context::{fields, Context, ContextPatch};

/// Stage receiving the semantic model file.
pub const MODEL_STAGE: &str = "MODELS";

/// Name of the document search service.
pub const SEARCH_SERVICE: &str = "SEARCH";

/// Table holding generated documents. Excluded from `table_info`.
pub const DOCUMENTS_TABLE: &str = "DOCUMENTS";

fn table_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_uppercase()
}

/// Loads every generated file into the session schema.
pub fn upload_data(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let schema = services.warehouse.ensure_schema(context.get_str(fields::SCHEMA))?;
    let output_dir = services.workspace.output_dir();

    let mut files = context.get_strings(fields::ARTIFACTS);
    let documents_file = context.get_str(fields::DOCUMENTS_FILE);
    if !documents_file.is_empty() && !files.iter().any(|f| f == documents_file) {
        files.push(documents_file.to_string());
    }

    let mut table_info: Vec<TableInfo> = Vec::new();
    for file in &files {
        let table = table_name(file);
        let info = services
            .warehouse
            .load_table(&schema, &table, &output_dir.join(file))?;

        if info.table_name != DOCUMENTS_TABLE {
            table_info.push(info);
        }
    }

    info!("Uploaded {} file(s) to schema {}", files.len(), schema);
    Ok(ContextPatch::new().set_serialized(fields::TABLE_INFO, &table_info)?)
}

/// Checks the semantic model YAML, writes it to the workspace and stages it.
pub fn publish_semantic_model(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let yaml = strip_code_fence(context.get_str(fields::SEMANTIC_MODEL_YAML));
    check_semantic_model(&yaml)?;

    let path = services.workspace.semantic_model_path();
    fs::write(&path, format!("{}\n", yaml))?;

    let staged = services
        .warehouse
        .put_stage_file(context.get_str(fields::SCHEMA), MODEL_STAGE, &path)?;

    Ok(ContextPatch::new().set(fields::SEMANTIC_MODEL_PATH, staged))
}

/// Requires a mapping with top-level `name` and `tables` keys.
fn check_semantic_model(yaml: &str) -> Result<(), StepError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| StepError::InvalidSemanticModel(e.to_string()))?;

    let mapping = value
        .as_mapping()
        .ok_or_else(|| StepError::InvalidSemanticModel("top level is not a mapping".to_string()))?;

    for key in ["name", "tables"] {
        if !mapping.contains_key(key) {
            return Err(StepError::InvalidSemanticModel(format!("missing '{}'", key)));
        }
    }
    Ok(())
}

/// Creates the search service over the documents table.
pub fn publish_search_index(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    if !context.contains(fields::DOCUMENTS_FILE) {
        warn!("No documents were generated; the search service will be empty");
    }

    let service = services.warehouse.create_search_service(
        context.get_str(fields::SCHEMA),
        SEARCH_SERVICE,
        DOCUMENTS_TABLE,
    )?;

    Ok(ContextPatch::new().set(fields::SEARCH_SERVICE_PATH, service))
}
