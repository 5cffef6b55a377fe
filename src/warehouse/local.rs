//! Directory-backed warehouse.
//!
//! Mirrors the objects a cloud warehouse would hold as plain files, which
//! makes sessions fully inspectable and runnable offline.
//!
//! ```text
//! <root>/
//!   <SCHEMA>/tables/<TABLE>.csv, <TABLE>.json
//!   <SCHEMA>/stages/<STAGE>/<file>
//!   <SCHEMA>/search/<SERVICE>.json
//!   .agents/<AGENT>.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::csv::read_records;
use super::{
    normalize_identifier, AgentRecord, AgentSpec, ColumnInfo, TableInfo, Warehouse, WarehouseError,
};

/// Number of sample values kept per column.
const SAMPLE_VALUES: usize = 5;

const AGENTS_DIR: &str = ".agents";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SearchServiceRecord {
    name: String,
    table: String,
    search_column: String,
    documents: usize,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocalWarehouse {
    root: PathBuf,
    database: String,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>, database: &str) -> Result<Self, WarehouseError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            database: normalize_identifier(database)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn schema_dir(&self, schema: &str) -> Result<(String, PathBuf), WarehouseError> {
        let schema = normalize_identifier(schema)?;
        let dir = self.root.join(&schema);
        Ok((schema, dir))
    }

    fn existing_schema_dir(&self, schema: &str) -> Result<(String, PathBuf), WarehouseError> {
        let (schema, dir) = self.schema_dir(schema)?;
        if !dir.is_dir() {
            return Err(WarehouseError::NotFound {
                kind: "schema",
                name: schema,
            });
        }
        Ok((schema, dir))
    }

    fn qualify(&self, schema: &str, object: &str) -> String {
        format!("{}.{}.{}", self.database, schema, object)
    }

    fn agent_path(&self, name: &str) -> Result<PathBuf, WarehouseError> {
        let name = normalize_identifier(name)?;
        Ok(self.root.join(AGENTS_DIR).join(format!("{}.json", name)))
    }
}

impl Warehouse for LocalWarehouse {
    fn ensure_schema(&self, schema: &str) -> Result<String, WarehouseError> {
        let (schema, dir) = self.schema_dir(schema)?;
        fs::create_dir_all(dir.join("tables"))?;
        fs::create_dir_all(dir.join("stages"))?;
        fs::create_dir_all(dir.join("search"))?;
        debug!("Schema {}.{} ready", self.database, schema);
        Ok(schema)
    }

    fn load_table(&self, schema: &str, table: &str, source: &Path) -> Result<TableInfo, WarehouseError> {
        let (schema, dir) = self.existing_schema_dir(schema)?;
        let table = normalize_identifier(table)?;

        let records = read_records(source)?;
        let (header, rows) = match records.split_first() {
            Some((header, rows)) if !header.is_empty() => (header, rows),
            _ => return Err(WarehouseError::EmptyTable(table)),
        };

        let columns: Vec<ColumnInfo> = header
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo {
                column_name: name.trim().to_uppercase(),
                sample_values: rows
                    .iter()
                    .filter_map(|row| row.get(i).cloned())
                    .take(SAMPLE_VALUES)
                    .collect(),
            })
            .collect();

        let primary_key = columns
            .first()
            .filter(|c| c.column_name.contains("ID"))
            .map(|c| c.column_name.clone());

        let info = TableInfo {
            fully_qualified_name: self.qualify(&schema, &table),
            table_name: table.clone(),
            primary_key,
            columns,
            row_count: rows.len(),
        };

        // Replace semantics: drop any previous copy of the table
        let tables = dir.join("tables");
        fs::create_dir_all(&tables)?;
        fs::copy(source, tables.join(format!("{}.csv", table)))?;
        fs::write(
            tables.join(format!("{}.json", table)),
            serde_json::to_string_pretty(&info)?,
        )?;

        info!("Loaded {} rows into {}", info.row_count, info.fully_qualified_name);
        Ok(info)
    }

    fn put_stage_file(&self, schema: &str, stage: &str, file: &Path) -> Result<String, WarehouseError> {
        let (schema, dir) = self.existing_schema_dir(schema)?;
        let stage = normalize_identifier(stage)?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WarehouseError::InvalidIdentifier(file.display().to_string()))?;

        let stage_dir = dir.join("stages").join(&stage);
        fs::create_dir_all(&stage_dir)?;
        fs::copy(file, stage_dir.join(file_name))?;

        let staged = format!("@{}/{}", self.qualify(&schema, &stage), file_name);
        info!("Staged {}", staged);
        Ok(staged)
    }

    fn create_search_service(&self, schema: &str, name: &str, table: &str) -> Result<String, WarehouseError> {
        let (schema, dir) = self.existing_schema_dir(schema)?;
        let name = normalize_identifier(name)?;
        let table = normalize_identifier(table)?;

        let table_meta = dir.join("tables").join(format!("{}.json", table));
        if !table_meta.exists() {
            return Err(WarehouseError::NotFound {
                kind: "table",
                name: self.qualify(&schema, &table),
            });
        }
        let info: TableInfo = serde_json::from_str(&fs::read_to_string(&table_meta)?)?;

        let record = SearchServiceRecord {
            name: name.clone(),
            table: info.fully_qualified_name,
            search_column: "TEXT".to_string(),
            documents: info.row_count,
            created_at: Utc::now(),
        };

        let search_dir = dir.join("search");
        fs::create_dir_all(&search_dir)?;
        fs::write(
            search_dir.join(format!("{}.json", name)),
            serde_json::to_string_pretty(&record)?,
        )?;

        let qualified = self.qualify(&schema, &name);
        info!("Created search service {} over {} documents", qualified, record.documents);
        Ok(qualified)
    }

    fn create_agent(&self, spec: &AgentSpec) -> Result<AgentRecord, WarehouseError> {
        let (schema, _) = self.existing_schema_dir(&spec.schema)?;
        let path = self.agent_path(&spec.name)?;
        let agent = normalize_identifier(&spec.name)?;

        let record = AgentRecord {
            fully_qualified_name: self.qualify(&schema, &agent),
            spec: spec.clone(),
            created_at: Utc::now(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            warn!("Replacing existing agent {}", agent);
        }
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;

        info!("Registered agent {}", record.fully_qualified_name);
        Ok(record)
    }

    fn list_agents(&self) -> Result<Vec<AgentRecord>, WarehouseError> {
        let dir = self.root.join(AGENTS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut agents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).map(|c| serde_json::from_str::<AgentRecord>(&c)) {
                Ok(Ok(record)) => agents.push(record),
                Ok(Err(e)) => warn!("Skipping corrupt agent record {}: {}", path.display(), e),
                Err(e) => warn!("Skipping unreadable agent record {}: {}", path.display(), e),
            }
        }

        agents.sort_by_key(|a| a.created_at);
        Ok(agents)
    }

    fn drop_agent(&self, name: &str) -> Result<(), WarehouseError> {
        let path = self.agent_path(name)?;
        if !path.exists() {
            return Err(WarehouseError::NotFound {
                kind: "agent",
                name: name.to_string(),
            });
        }
        fs::remove_file(&path)?;
        info!("Dropped agent {}", name);
        Ok(())
    }

    fn list_schemas(&self) -> Result<Vec<String>, WarehouseError> {
        let mut schemas = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    schemas.push(name.to_string());
                }
            }
        }
        schemas.sort();
        Ok(schemas)
    }

    fn drop_schema(&self, schema: &str) -> Result<(), WarehouseError> {
        let (schema, dir) = self.existing_schema_dir(schema)?;
        fs::remove_dir_all(&dir)?;
        info!("Dropped schema {}", schema);
        Ok(())
    }
}
