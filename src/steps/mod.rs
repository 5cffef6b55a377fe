//! Workflow Steps
//!
//! One function per graph node. Each step reads what it needs from the
//! [`Context`], talks to its collaborators through [`StepServices`], and
//! returns a [`ContextPatch`] holding only the fields it owns.
//!
//! Steps never decide where the session goes next; that is the job of
//! [`crate::workflow::graph`].

pub mod agent;
pub mod dataset;
pub mod documents;
pub mod publish;
pub mod scenario;
pub mod semantic;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StepError;
use crate::execution::script::ScriptRunner;
use crate::execution::workspace::SessionWorkspace;
use crate::llm::{GenerationRequest, Generator, Task};
use crate::warehouse::Warehouse;
use crate::workflow::context::{Context, ContextPatch};
use crate::workflow::node::Node;

/// Number of questions in a scenario and of sample questions for the agent.
pub const QUESTION_COUNT: usize = 5;

/// Collaborators available to a step while it runs.
pub struct StepServices<'a> {
    pub generator: &'a dyn Generator,
    pub runner: &'a dyn ScriptRunner,
    pub warehouse: &'a dyn Warehouse,
    pub workspace: &'a SessionWorkspace,
}

impl<'a> StepServices<'a> {
    /// Sends a request and parses the reply into the task's output type.
    pub(crate) fn generate<T: DeserializeOwned>(&self, request: &GenerationRequest) -> Result<T, StepError> {
        let value = self.generator.generate(request)?;
        parse_output(request.task, value)
    }
}

/// Runs the step behind `node` against the current context.
///
/// `End` produces an empty patch.
pub fn execute(node: Node, context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    match node {
        Node::GenerateScenario => scenario::generate(context, services),
        Node::PresentScenario => scenario::present(context, services),
        Node::AwaitApproval => scenario::review(context, services),
        Node::GenerateDatasetScript => dataset::generate(context, services),
        Node::ValidateDatasetScript => dataset::validate(context, services),
        Node::RunDatasetScript => dataset::run(context, services),
        Node::RepairDatasetScript => dataset::repair(context, services),
        Node::GenerateDocumentData => documents::generate(context, services),
        Node::UploadData => publish::upload_data(context, services),
        Node::GenerateSemanticModel => semantic::generate(context, services),
        Node::ValidateSemanticModel => semantic::validate(context, services),
        Node::PublishSemanticModel => publish::publish_semantic_model(context, services),
        Node::PublishSearchIndex => publish::publish_search_index(context, services),
        Node::GenerateAgentDescription => agent::describe(context, services),
        Node::RegisterAgent => agent::register(context, services),
        Node::PresentResults => agent::present_results(context, services),
        Node::End => Ok(ContextPatch::new()),
    }
}

/// Deserializes generator output, reporting shape problems as malformed output.
pub fn parse_output<T: DeserializeOwned>(task: Task, value: Value) -> Result<T, StepError> {
    serde_json::from_value(value).map_err(|e| StepError::MalformedOutput {
        task,
        reason: e.to_string(),
    })
}

/// Fails unless `text` has visible content.
pub(crate) fn require_text(task: Task, field: &str, text: &str) -> Result<(), StepError> {
    if text.trim().is_empty() {
        return Err(StepError::MalformedOutput {
            task,
            reason: format!("'{}' is empty", field),
        });
    }
    Ok(())
}

/// Fails unless exactly [`QUESTION_COUNT`] non-empty questions are present.
pub(crate) fn require_questions(task: Task, field: &str, questions: &[String]) -> Result<(), StepError> {
    if questions.len() != QUESTION_COUNT {
        return Err(StepError::MalformedOutput {
            task,
            reason: format!(
                "expected {} entries in '{}', got {}",
                QUESTION_COUNT,
                field,
                questions.len()
            ),
        });
    }
    if questions.iter().any(|q| q.trim().is_empty()) {
        return Err(StepError::MalformedOutput {
            task,
            reason: format!("'{}' contains an empty entry", field),
        });
    }
    Ok(())
}
