//! Scenario generation, presentation and human review.

use log::{debug, info};
use serde::Deserialize;

use super::{require_questions, require_text, StepServices};
use crate::error::StepError;
use crate::llm::{GenerationRequest, Task};
use crate::workflow::context::{fields, Context, ContextPatch};

#[derive(Deserialize)]
struct ScenarioOutput {
    demo_description: String,
    questions: Vec<String>,
}

#[derive(Deserialize)]
struct PresentationOutput {
    message: String,
}

#[derive(Deserialize)]
struct ReviewOutput {
    approved: bool,
}

/// Drafts the demo description and its five questions. After a rejected
/// review, the previous draft and the feedback are sent along for revision.
pub fn generate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let mut request = GenerationRequest::new(Task::Scenario).inputs_from(context, &[fields::PROMPT]);

    if !context.get_str(fields::HUMAN_INPUT).trim().is_empty() {
        debug!("Revising scenario with reviewer feedback");
        request = request.inputs_from(
            context,
            &[fields::DEMO_DESCRIPTION, fields::QUESTIONS, fields::HUMAN_INPUT],
        );
    }

    let output: ScenarioOutput = services.generate(&request)?;
    require_text(Task::Scenario, fields::DEMO_DESCRIPTION, &output.demo_description)?;
    require_questions(Task::Scenario, fields::QUESTIONS, &output.questions)?;

    Ok(ContextPatch::new()
        .set(fields::DEMO_DESCRIPTION, output.demo_description)
        .set(fields::QUESTIONS, output.questions))
}

/// Writes the message shown to the reviewer.
pub fn present(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::PresentScenario)
        .inputs_from(context, &[fields::DEMO_DESCRIPTION, fields::QUESTIONS]);

    let output: PresentationOutput = services.generate(&request)?;
    require_text(Task::PresentScenario, "message", &output.message)?;

    Ok(ContextPatch::new().set(fields::PRESENTATION, output.message))
}

/// Decides whether the reviewer's reply approves the scenario.
///
/// Any suggested change counts as a rejection. A blank reply is rejected
/// without consulting the generator.
pub fn review(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let rounds = context.get_u32(fields::APPROVAL_ROUNDS).saturating_add(1);
    let reply = context.get_str(fields::HUMAN_INPUT);

    let approved = if reply.trim().is_empty() {
        false
    } else {
        let request = GenerationRequest::new(Task::ReviewFeedback).inputs_from(
            context,
            &[fields::HUMAN_INPUT, fields::DEMO_DESCRIPTION, fields::QUESTIONS],
        );
        services.generate::<ReviewOutput>(&request)?.approved
    };

    info!(
        "Review round {}: scenario {}",
        rounds,
        if approved { "approved" } else { "needs changes" }
    );

    Ok(ContextPatch::new()
        .set(fields::APPROVED, approved)
        .set(fields::APPROVAL_ROUNDS, rounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StepHarness, DEMO_QUESTIONS};
    use serde_json::json;

    fn drafted(reply: &str) -> Context {
        let mut context = Context::with_prompt("build a retail demo");
        context.apply(
            ContextPatch::new()
                .set(fields::DEMO_DESCRIPTION, "Retail ops")
                .set(fields::QUESTIONS, DEMO_QUESTIONS.to_vec())
                .set(fields::HUMAN_INPUT, reply),
        );
        context
    }

    #[test]
    fn test_generate_first_draft_uses_prompt_only() {
        let harness = StepHarness::new();
        let patch = generate(&Context::with_prompt("build a retail demo"), &harness.services()).unwrap();

        assert_eq!(patch.get(fields::QUESTIONS).unwrap().as_array().unwrap().len(), 5);
        let request = &harness.generator.requests_for(Task::Scenario)[0];
        assert_eq!(request.inputs.len(), 1);
        assert_eq!(request.inputs[fields::PROMPT], "build a retail demo");
    }

    #[test]
    fn test_generate_revision_includes_feedback() {
        let harness = StepHarness::new();
        generate(&drafted("add a returns table"), &harness.services()).unwrap();

        let request = &harness.generator.requests_for(Task::Scenario)[0];
        assert_eq!(request.inputs[fields::HUMAN_INPUT], "add a returns table");
        assert_eq!(request.inputs[fields::DEMO_DESCRIPTION], "Retail ops");
    }

    #[test]
    fn test_generate_rejects_wrong_question_count() {
        let harness = StepHarness::new();
        harness.generator.push(
            Task::Scenario,
            json!({"demo_description": "d", "questions": ["only", "four", "of", "them"]}),
        );

        let err = generate(&Context::with_prompt("p"), &harness.services()).unwrap_err();
        assert!(matches!(err, StepError::MalformedOutput { task: Task::Scenario, .. }));
    }

    #[test]
    fn test_present_writes_presentation() {
        let harness = StepHarness::new();
        let patch = present(&drafted(""), &harness.services()).unwrap();
        assert!(patch.get(fields::PRESENTATION).unwrap().as_str().unwrap().contains("demo idea"));
    }

    #[test]
    fn test_review_plain_yes_approves() {
        let harness = StepHarness::new();
        let patch = review(&drafted("yes"), &harness.services()).unwrap();

        assert_eq!(patch.get(fields::APPROVED), Some(&json!(true)));
        assert_eq!(patch.get(fields::APPROVAL_ROUNDS), Some(&json!(1)));
    }

    #[test]
    fn test_review_suggested_edit_rejects() {
        let harness = StepHarness::new();
        let patch = review(&drafted("looks fine but add a returns table"), &harness.services()).unwrap();
        assert_eq!(patch.get(fields::APPROVED), Some(&json!(false)));
    }

    #[test]
    fn test_review_blank_reply_skips_generator() {
        let harness = StepHarness::new();
        let mut context = drafted("   ");
        context.apply(ContextPatch::new().set(fields::APPROVAL_ROUNDS, 3));

        let patch = review(&context, &harness.services()).unwrap();

        assert_eq!(patch.get(fields::APPROVED), Some(&json!(false)));
        assert_eq!(patch.get(fields::APPROVAL_ROUNDS), Some(&json!(4)));
        assert_eq!(harness.generator.count(Task::ReviewFeedback), 0);
    }

    #[test]
    fn test_review_generator_failure_is_fatal() {
        let harness = StepHarness::new();
        harness.generator.fail_on(Task::ReviewFeedback);
        assert!(matches!(
            review(&drafted("yes"), &harness.services()),
            Err(StepError::Generate(_))
        ));
    }
}
