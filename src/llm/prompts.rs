//! Prompt Text
//!
//! Instruction wording for each [`Task`]. Kept apart from the workflow
//! core so it can be tuned without touching orchestration.

use super::Task;

/// Task-specific instructions for the model.
pub fn instructions(task: Task) -> &'static str {
    match task {
        Task::Scenario => {
            "Invent a realistic business demo for a data platform based on the user's prompt. \
             Describe the company, the data it keeps and why an analytics agent helps. \
             Provide exactly five questions a sales engineer could ask the agent: some answered \
             from structured tables with SQL, some answered from unstructured documents. \
             If previous feedback is given, revise the previous scenario to address it."
        }
        Task::PresentScenario => {
            "Write a short, friendly message presenting the demo description and its five \
             questions to the user, then ask whether they approve or want changes."
        }
        Task::ReviewFeedback => {
            "Decide whether the user's reply approves the demo idea. \
             If the reply suggests any change or addition, it is not an approval."
        }
        Task::DatasetScript => {
            "Write a self-contained Python script that generates synthetic tabular data for the \
             demo using pandas, numpy and faker. Write one CSV file per table into the \
             `generated_csvs` directory relative to the working directory. Upper-case table \
             and column names, put an ID column first in every table, and keep foreign keys \
             consistent. Also choose a warehouse schema name and a short agent name."
        }
        Task::ValidateDatasetScript => {
            "Review the Python script for errors that would stop it from running or from \
             writing its CSV files. Return the corrected script, or the same script if it is fine."
        }
        Task::RepairDatasetScript => {
            "The Python script failed with the given error. Return a corrected version of the \
             whole script that fixes the error without changing what data it produces."
        }
        Task::DocumentPlan => {
            "List the documents an agent would need to answer the document-based questions of \
             this demo. Ignore questions answered by SQL. Use at most five documents, each with \
             a title, a plausible URL and a description of how to generate its text."
        }
        Task::Document => {
            "Write the full text of the described document in plain prose."
        }
        Task::SemanticModel => {
            "Write a semantic model in YAML describing the given tables for natural language \
             querying: a top-level `name`, and `tables` with their base table, dimensions, \
             time dimensions, facts and primary keys."
        }
        Task::ValidateSemanticModel => {
            "Check the semantic model YAML against the tables it describes. Fix invalid \
             column references and structure, and return the complete corrected YAML."
        }
        Task::AgentDescription => {
            "Write a markdown description of the demo agent in the third person, and rewrite \
             the five demo questions as suggested sample questions."
        }
        Task::Summary => {
            "Summarize what was built for the demo: the schema, the tables, the search \
             service, the semantic model and the agent, with the sample questions to try."
        }
    }
}

/// Full system prompt: task instructions plus the required output shape.
pub fn system_prompt(task: Task) -> String {
    let fields = task
        .output_fields()
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n\nRespond with a single JSON object containing exactly these keys: {}.",
        instructions(task),
        fields
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_output_fields() {
        let prompt = system_prompt(Task::DatasetScript);
        assert!(prompt.contains("\"script\", \"schema\", \"agent_name\""));
        assert!(prompt.starts_with(instructions(Task::DatasetScript)));
    }

    #[test]
    fn test_review_prompt_mentions_changes() {
        assert!(instructions(Task::ReviewFeedback).contains("not an approval"));
    }
}
