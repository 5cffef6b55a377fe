//! Synthetic dataset script: generate, check, run and repair.

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;

use super::{require_text, StepServices};
use crate::error::StepError;
use crate::execution::script::ScriptOutcome;
use crate::llm::{GenerationRequest, Task};
use crate::workflow::context::{fields, Context, ContextPatch};

#[derive(Deserialize)]
struct DatasetScriptOutput {
    script: String,
    schema: String,
    agent_name: String,
}

#[derive(Deserialize)]
struct ScriptOutput {
    script: String,
}

pub fn generate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::DatasetScript)
        .inputs_from(context, &[fields::DEMO_DESCRIPTION, fields::QUESTIONS])
        .input("current_date", Utc::now().format("%Y-%m-%d").to_string());

    let output: DatasetScriptOutput = services.generate(&request)?;
    require_text(Task::DatasetScript, fields::SCRIPT, &output.script)?;
    require_text(Task::DatasetScript, fields::SCHEMA, &output.schema)?;

    Ok(ContextPatch::new()
        .set(fields::SCRIPT, output.script)
        .set(fields::SCHEMA, output.schema)
        .set(fields::AGENT_NAME, output.agent_name))
}

pub fn validate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let request = GenerationRequest::new(Task::ValidateDatasetScript)
        .inputs_from(context, &[fields::SCRIPT, fields::DEMO_DESCRIPTION]);

    let output: ScriptOutput = services.generate(&request)?;
    require_text(Task::ValidateDatasetScript, fields::SCRIPT, &output.script)?;

    Ok(ContextPatch::new().set(fields::SCRIPT, output.script))
}

/// Executes the current script. Failure is recorded, never raised.
pub fn run(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let outcome = services
        .runner
        .run(context.get_str(fields::SCRIPT), services.workspace);

    let patch = match outcome {
        ScriptOutcome::Succeeded { artifacts } => {
            info!("Dataset script produced: {}", artifacts.join(", "));
            ContextPatch::new()
                .set(fields::ARTIFACTS, artifacts)
                .set(fields::FAILURE_DETAIL, "")
        }
        ScriptOutcome::Failed { detail } => {
            let detail = if detail.trim().is_empty() {
                "Script failed without producing any error output".to_string()
            } else {
                detail
            };
            warn!("Dataset script failed, routing to repair");
            ContextPatch::new()
                .set(fields::ARTIFACTS, Vec::<String>::new())
                .set(fields::FAILURE_DETAIL, detail)
        }
    };

    Ok(patch)
}

/// Rewrites the script to address the last failure.
pub fn repair(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let attempts = context.get_u32(fields::REPAIR_ATTEMPTS).saturating_add(1);
    info!("Repair attempt {}", attempts);

    let request = GenerationRequest::new(Task::RepairDatasetScript)
        .inputs_from(context, &[fields::SCRIPT, fields::FAILURE_DETAIL]);

    let output: ScriptOutput = services.generate(&request)?;
    require_text(Task::RepairDatasetScript, fields::SCRIPT, &output.script)?;

    Ok(ContextPatch::new()
        .set(fields::SCRIPT, output.script)
        .set(fields::FAILURE_DETAIL, "")
        .set(fields::REPAIR_ATTEMPTS, attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StepHarness;
    use serde_json::json;

    fn with_script(script: &str) -> Context {
        let mut context = Context::with_prompt("build a retail demo");
        context.apply(ContextPatch::new().set(fields::SCRIPT, script));
        context
    }

    #[test]
    fn test_generate_sends_current_date() {
        let harness = StepHarness::new();
        let patch = generate(&Context::with_prompt("p"), &harness.services()).unwrap();

        assert_eq!(patch.get(fields::SCHEMA), Some(&json!("retail_demo")));
        let request = &harness.generator.requests_for(Task::DatasetScript)[0];
        assert_eq!(request.inputs["current_date"].as_str().unwrap().len(), 10);
    }

    #[test]
    fn test_generate_requires_schema() {
        let harness = StepHarness::new();
        harness.generator.push(
            Task::DatasetScript,
            json!({"script": "print(1)", "schema": "", "agent_name": "A"}),
        );
        assert!(generate(&Context::with_prompt("p"), &harness.services()).is_err());
    }

    #[test]
    fn test_validate_replaces_script() {
        let harness = StepHarness::new();
        harness.generator.push(Task::ValidateDatasetScript, json!({"script": "print(2)"}));

        let patch = validate(&with_script("print(1)"), &harness.services()).unwrap();
        assert_eq!(patch.get(fields::SCRIPT), Some(&json!("print(2)")));
    }

    #[test]
    fn test_run_success_clears_failure() {
        let harness = StepHarness::new();
        harness.runner.succeed(&["CUSTOMERS.csv", "ORDERS.csv"]);

        let patch = run(&with_script("print(1)"), &harness.services()).unwrap();

        assert_eq!(patch.get(fields::ARTIFACTS), Some(&json!(["CUSTOMERS.csv", "ORDERS.csv"])));
        assert_eq!(patch.get(fields::FAILURE_DETAIL), Some(&json!("")));
        assert_eq!(harness.runner.scripts(), vec!["print(1)"]);
    }

    #[test]
    fn test_run_failure_is_recorded() {
        let harness = StepHarness::new();
        harness.runner.fail("KeyError: CUSTOMER_ID");

        let patch = run(&with_script("print(1)"), &harness.services()).unwrap();

        assert_eq!(patch.get(fields::FAILURE_DETAIL), Some(&json!("KeyError: CUSTOMER_ID")));
        assert_eq!(patch.get(fields::ARTIFACTS), Some(&json!([])));
    }

    #[test]
    fn test_run_blank_failure_still_routes_to_repair() {
        let harness = StepHarness::new();
        harness.runner.fail("  ");

        let mut context = with_script("print(1)");
        context.apply(run(&context, &harness.services()).unwrap());
        assert!(context.has_failure());
    }

    #[test]
    fn test_repair_clears_failure_and_counts() {
        let harness = StepHarness::new();
        let mut context = with_script("df['CUSTOMER_ID']");
        context.apply(
            ContextPatch::new()
                .set(fields::FAILURE_DETAIL, "KeyError: CUSTOMER_ID")
                .set(fields::REPAIR_ATTEMPTS, 1),
        );

        context.apply(repair(&context, &harness.services()).unwrap());

        assert!(!context.has_failure());
        assert_eq!(context.get_u32(fields::REPAIR_ATTEMPTS), 2);
        assert!(context.get_str(fields::SCRIPT).starts_with("# fixed"));

        let request = &harness.generator.requests_for(Task::RepairDatasetScript)[0];
        assert_eq!(request.inputs[fields::FAILURE_DETAIL], "KeyError: CUSTOMER_ID");
    }
}
