//! DemoForge - Sales Demo Builder
//!
//! Turns a one-line demo prompt into a ready-to-run analytics demo: a
//! scenario approved by a human, synthetic data loaded into a warehouse,
//! a semantic model, a document search service and a registered agent.
//!
//! # Architecture
//!
//! - [`workflow`]: Nodes, transition table, session context and checkpoints
//! - [`steps`]: What each node does
//! - [`execution`]: Session engine, script runner and per-session workspaces
//! - [`llm`]: Generation capability and its OpenAI-compatible adapter
//! - [`warehouse`]: Warehouse boundary and a directory-backed implementation
//! - [`environment`]: Python interpreter discovery
//! - [`monitoring`]: Progress events and node timing
//! - [`config`]: YAML application configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use demoforge::execution::ProcessScriptRunner;
//! use demoforge::llm::{OpenAiConfig, OpenAiGenerator};
//! use demoforge::warehouse::LocalWarehouse;
//! use demoforge::workflow::FileCheckpointStore;
//! use demoforge::{AppConfig, Engine, RunOutcome};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let generator = OpenAiGenerator::new(OpenAiConfig {
//!         api_key: config.api_key(),
//!         base_url: config.api_base.clone(),
//!         model: config.model.clone(),
//!         timeout: config.request_timeout(),
//!         api_key_env: config.api_key_env.clone(),
//!     })?;
//!
//!     let mut engine = Engine::new(
//!         Arc::new(generator),
//!         Arc::new(ProcessScriptRunner::new("python3").with_timeout(config.script_timeout())),
//!         Arc::new(LocalWarehouse::new(config.warehouse_dir(), &config.database)?),
//!         Arc::new(FileCheckpointStore::new(config.checkpoint_dir())),
//!     );
//!     engine.set_work_root(config.sessions_dir());
//!     engine.set_limits(config.limits());
//!
//!     if let RunOutcome::Suspended(payload) = engine.start("build a retail demo")? {
//!         println!("{}", payload.scenario);
//!         engine.resume(&payload.session_id, "yes")?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod llm;
pub mod monitoring;
pub mod steps;
pub mod warehouse;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{StepError, WorkflowError};
pub use execution::engine::{Engine, RunOutcome};
pub use workflow::{Context, Node, SessionId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "DemoForge";
