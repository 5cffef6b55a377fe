//! Generation Capability
//!
//! Every text-producing step goes through the [`Generator`] trait: it
//! receives a [`GenerationRequest`] naming the [`Task`] and carrying the
//! task inputs drawn from the session context, and returns a JSON object
//! whose fields are listed by [`Task::output_fields`].
//!
//! Prompt wording lives in [`prompts`]; the HTTP adapter in [`openai`].

pub mod openai;
pub mod prompts;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::workflow::context::Context;

pub use openai::{OpenAiConfig, OpenAiGenerator};

/// A kind of generation request.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Scenario,
    PresentScenario,
    ReviewFeedback,
    DatasetScript,
    ValidateDatasetScript,
    RepairDatasetScript,
    DocumentPlan,
    Document,
    SemanticModel,
    ValidateSemanticModel,
    AgentDescription,
    Summary,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scenario => "scenario",
            Self::PresentScenario => "present_scenario",
            Self::ReviewFeedback => "review_feedback",
            Self::DatasetScript => "dataset_script",
            Self::ValidateDatasetScript => "validate_dataset_script",
            Self::RepairDatasetScript => "repair_dataset_script",
            Self::DocumentPlan => "document_plan",
            Self::Document => "document",
            Self::SemanticModel => "semantic_model",
            Self::ValidateSemanticModel => "validate_semantic_model",
            Self::AgentDescription => "agent_description",
            Self::Summary => "summary",
        }
    }

    /// Fields the generator must return for this task.
    pub fn output_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Scenario => &["demo_description", "questions"],
            Self::PresentScenario => &["message"],
            Self::ReviewFeedback => &["approved"],
            Self::DatasetScript => &["script", "schema", "agent_name"],
            Self::ValidateDatasetScript | Self::RepairDatasetScript => &["script"],
            Self::DocumentPlan => &["documents"],
            Self::Document => &["text"],
            Self::SemanticModel | Self::ValidateSemanticModel => &["semantic_model_yaml"],
            Self::AgentDescription => &["agent_description", "sample_questions"],
            Self::Summary => &["summary"],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One call to the generation capability.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub task: Task,
    pub inputs: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            inputs: Map::new(),
        }
    }

    /// Adds a single named input.
    pub fn input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }

    /// Copies the listed context fields that are present into the inputs.
    pub fn inputs_from(mut self, context: &Context, keys: &[&str]) -> Self {
        self.inputs.extend(context.select(keys));
        self
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API key not set: environment variable {0} is empty or missing")]
    MissingApiKey(String),

    #[error("generator returned no content")]
    EmptyResponse,

    #[error("generator returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("generator output is not a JSON object")]
    NotAnObject,

    #[error("generator rejected the request: {0}")]
    Rejected(String),
}

/// Produces structured output for a [`GenerationRequest`].
///
/// Implementations must return a JSON object. Shape validation against
/// [`Task::output_fields`] is left to the calling step.
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerateError>;
}
