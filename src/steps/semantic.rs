//! Semantic model drafting and review.

use serde::Deserialize;

use super::{require_text, StepServices};
use crate::error::StepError;
use crate::llm::{GenerationRequest, Task};
use crate::workflow::context::{fields, Context, ContextPatch};

#[derive(Deserialize)]
struct SemanticModelOutput {
    semantic_model_yaml: String,
}

pub fn generate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::SemanticModel).inputs_from(
        context,
        &[fields::DEMO_DESCRIPTION, fields::QUESTIONS, fields::TABLE_INFO],
    );
    request_model(Task::SemanticModel, &request, services)
}

pub fn validate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::ValidateSemanticModel)
        .inputs_from(context, &[fields::SEMANTIC_MODEL_YAML, fields::TABLE_INFO]);
    request_model(Task::ValidateSemanticModel, &request, services)
}

fn request_model(
    task: Task,
    request: &GenerationRequest,
    services: &StepServices,
) -> Result<ContextPatch, StepError> {
    let output: SemanticModelOutput = services.generate(request)?;
    require_text(task, fields::SEMANTIC_MODEL_YAML, &output.semantic_model_yaml)?;
    Ok(ContextPatch::new().set(fields::SEMANTIC_MODEL_YAML, output.semantic_model_yaml))
}
