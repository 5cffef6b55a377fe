//! Warehouse Boundary
//!
//! Everything the workflow needs from a data warehouse: schemas, tables
//! loaded from generated files, a stage for the semantic model, a search
//! service over documents, and agent registration. The SQL dialect and
//! connection handling of a real warehouse stay behind [`Warehouse`].

pub mod csv;
pub mod local;

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalWarehouse;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("warehouse metadata is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("table '{0}' has no header row")]
    EmptyTable(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub column_name: String,
    pub sample_values: Vec<String>,
}

/// Metadata of a loaded table, handed to semantic model generation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub table_name: String,
    pub fully_qualified_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

/// Everything needed to register a conversational agent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub schema: String,
    pub search_service: String,
    pub semantic_model_path: String,
    pub sample_questions: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentRecord {
    pub fully_qualified_name: String,
    pub spec: AgentSpec,
    pub created_at: DateTime<Utc>,
}

pub trait Warehouse: Send + Sync {
    /// Creates the schema if missing. Returns the normalized schema name.
    fn ensure_schema(&self, schema: &str) -> Result<String, WarehouseError>;

    /// Replaces `table` in `schema` with the contents of a CSV file.
    fn load_table(&self, schema: &str, table: &str, source: &Path) -> Result<TableInfo, WarehouseError>;

    /// Uploads a file to a named stage. Returns the staged file path.
    fn put_stage_file(&self, schema: &str, stage: &str, file: &Path) -> Result<String, WarehouseError>;

    /// Creates a search service over the `TEXT` column of `table`.
    /// Returns the fully qualified service name.
    fn create_search_service(&self, schema: &str, name: &str, table: &str) -> Result<String, WarehouseError>;

    fn create_agent(&self, spec: &AgentSpec) -> Result<AgentRecord, WarehouseError>;

    fn list_agents(&self) -> Result<Vec<AgentRecord>, WarehouseError>;

    fn drop_agent(&self, name: &str) -> Result<(), WarehouseError>;

    fn list_schemas(&self) -> Result<Vec<String>, WarehouseError>;

    fn drop_schema(&self, schema: &str) -> Result<(), WarehouseError>;
}

/// Upper-cases an identifier and replaces anything but ASCII
/// alphanumerics with `_`.
pub fn normalize_identifier(raw: &str) -> Result<String, WarehouseError> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();

    if normalized.is_empty() || normalized.chars().all(|c| c == '_') {
        return Err(WarehouseError::InvalidIdentifier(raw.to_string()));
    }
    Ok(normalized)
}
