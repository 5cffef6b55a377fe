//! Agent description, registration and the closing summary.

use log::info;
use serde::Deserialize;

use super::{require_questions, require_text, StepServices};
use crate::error::StepError;
use crate::llm::{GenerationRequest, Task};
use crate::warehouse::AgentSpec;
use crate::workflow::context::{fields, Context, ContextPatch};

/// Agent name used when the dataset step did not pick one.
pub const DEFAULT_AGENT_NAME: &str = "Demo Agent";

#[derive(Deserialize)]
struct DescriptionOutput {
    agent_description: String,
    sample_questions: Vec<String>,
}

#[derive(Deserialize)]
struct SummaryOutput {
    summary: String,
}

pub fn describe(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::AgentDescription)
        .inputs_from(context, &[fields::DEMO_DESCRIPTION, fields::QUESTIONS]);

    let output: DescriptionOutput = services.generate(&request)?;
    require_text(Task::AgentDescription, fields::AGENT_DESCRIPTION, &output.agent_description)?;
    require_questions(Task::AgentDescription, fields::SAMPLE_QUESTIONS, &output.sample_questions)?;

    Ok(ContextPatch::new()
        .set(fields::AGENT_DESCRIPTION, output.agent_description)
        .set(fields::SAMPLE_QUESTIONS, output.sample_questions))
}

/// Resolves the agent name, falling back to [`DEFAULT_AGENT_NAME`].
pub fn agent_name(context: &Context) -> &str {
    let name = context.get_str(fields::AGENT_NAME).trim();
    if name.is_empty() {
        DEFAULT_AGENT_NAME
    } else {
        name
    }
}

pub fn register(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let spec = AgentSpec {
        name: agent_name(context).to_string(),
        description: context.get_str(fields::AGENT_DESCRIPTION).to_string(),
        schema: context.get_str(fields::SCHEMA).to_string(),
        search_service: context.get_str(fields::SEARCH_SERVICE_PATH).to_string(),
        semantic_model_path: context.get_str(fields::SEMANTIC_MODEL_PATH).to_string(),
        sample_questions: context.get_strings(fields::SAMPLE_QUESTIONS),
    };

    let record = services.warehouse.create_agent(&spec)?;
    info!("Agent available as {}", record.fully_qualified_name);

    Ok(ContextPatch::new().set(fields::AGENT_RECORD, record.fully_qualified_name))
}

pub fn present_results(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::Summary).inputs_from(
        context,
        &[
            fields::DEMO_DESCRIPTION,
            fields::SCHEMA,
            fields::AGENT_NAME,
            fields::TABLE_INFO,
            fields::SEARCH_SERVICE_PATH,
            fields::SEMANTIC_MODEL_PATH,
            fields::AGENT_RECORD,
            fields::SAMPLE_QUESTIONS,
        ],
    );

    let output: SummaryOutput = services.generate(&request)?;
    require_text(Task::Summary, "summary", &output.summary)?;

    Ok(ContextPatch::new().set(fields::FINAL_RESPONSE, output.summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StepHarness, DEMO_QUESTIONS};
    use crate::warehouse::Warehouse;
    use serde_json::json;

    #[test]
    fn test_describe_requires_five_sample_questions() {
        let harness = StepHarness::new();
        harness.generator.push(
            Task::AgentDescription,
            json!({"agent_description": "d", "sample_questions": ["a", "b"]}),
        );
        assert!(describe(&Context::new(), &harness.services()).is_err());

        let patch = describe(&Context::new(), &harness.services()).unwrap();
        assert_eq!(patch.get(fields::SAMPLE_QUESTIONS), Some(&json!(DEMO_QUESTIONS)));
    }

    #[test]
    fn test_agent_name_default() {
        let mut context = Context::new();
        assert_eq!(agent_name(&context), DEFAULT_AGENT_NAME);

        context.apply(ContextPatch::new().set(fields::AGENT_NAME, "Retail Agent"));
        assert_eq!(agent_name(&context), "Retail Agent");
    }

    #[test]
    fn test_register_creates_agent() {
        let harness = StepHarness::new();
        harness.warehouse.ensure_schema("RETAIL").unwrap();
        let mut context = Context::new();
        context.apply(
            ContextPatch::new()
                .set(fields::SCHEMA, "RETAIL")
                .set(fields::AGENT_DESCRIPTION, "Answers retail questions")
                .set(fields::SAMPLE_QUESTIONS, DEMO_QUESTIONS.to_vec()),
        );

        context.apply(register(&context, &harness.services()).unwrap());

        assert_eq!(context.get_str(fields::AGENT_RECORD), "DEMO_DB.RETAIL.DEMO_AGENT");
        let agents = harness.warehouse.list_agents().unwrap();
        assert_eq!(agents[0].spec.sample_questions.len(), 5);
    }

    #[test]
    fn test_present_results_writes_final_response() {
        let harness = StepHarness::new();
        let patch = present_results(&Context::new(), &harness.services()).unwrap();
        assert_eq!(patch.get(fields::FINAL_RESPONSE), Some(&json!("The retail demo is ready.")));
    }
}
