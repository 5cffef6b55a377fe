//! Unstructured document data for the search index.

use log::info;
use serde::{Deserialize, Serialize};

use super::{require_text, StepServices};
use crate::error::StepError;
use crate::llm::{GenerationRequest, Task};
use crate::warehouse::csv::write_records;
use crate::workflow::context::{fields, Context, ContextPatch};

/// File holding the generated documents, next to the dataset script output.
pub const DOCUMENTS_FILE: &str = "DOCUMENTS.csv";

pub const DOCUMENT_COLUMNS: [&str; 3] = ["DOCUMENT_TITLE", "DOCUMENT_URL", "TEXT"];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlannedDocument {
    pub title: String,
    pub url: String,
    pub generation_description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Document {
    pub title: String,
    pub url: String,
    pub text: String,
}

#[derive(Deserialize)]
struct PlanOutput {
    documents: Vec<PlannedDocument>,
}

#[derive(Deserialize)]
struct DocumentOutput {
    text: String,
}

/// Plans the documents the demo needs, writes each one, and saves them
/// as a CSV file in the session output directory.
pub fn generate(context: &Context, services: &StepServices) -> Result<ContextPatch, StepError> {
    let plan_request = GenerationRequest::new(Task::DocumentPlan)
        .inputs_from(context, &[fields::DEMO_DESCRIPTION, fields::QUESTIONS]);
    let plan: PlanOutput = services.generate(&plan_request)?;

    let mut documents = Vec::with_capacity(plan.documents.len());
    for planned in plan.documents {
        require_text(Task::DocumentPlan, "title", &planned.title)?;

        let request = GenerationRequest::new(Task::Document)
            .inputs_from(context, &[fields::DEMO_DESCRIPTION])
            .input("title", planned.title.as_str())
            .input("url", planned.url.as_str())
            .input("generation_description", planned.generation_description.as_str());
        let output: DocumentOutput = services.generate(&request)?;
        require_text(Task::Document, "text", &output.text)?;

        documents.push(Document {
            title: planned.title,
            url: planned.url,
            text: output.text,
        });
    }

    let rows: Vec<Vec<String>> = documents
        .iter()
        .map(|d| vec![d.title.clone(), d.url.clone(), d.text.clone()])
        .collect();

    let dir = services.workspace.output_dir();
    std::fs::create_dir_all(&dir)?;
    write_records(&dir.join(DOCUMENTS_FILE), &DOCUMENT_COLUMNS, &rows)?;

    info!("Generated {} document(s)", documents.len());

    Ok(ContextPatch::new()
        .set_serialized(fields::DOCUMENTS, &documents)?
        .set(fields::DOCUMENTS_FILE, DOCUMENTS_FILE))
}
