//! Workflow Execution Module
//!
//! Runs sessions through the workflow graph and executes the generated
//! dataset script in an isolated per-session directory.
//!
//! # Architecture
//!
//! - [`engine`]: Session driver with suspend/resume
//! - [`script`]: External script execution
//! - [`workspace`]: Per-session working directories

pub mod engine;
pub mod script;
pub mod workspace;

pub use engine::{Engine, FinalResult, RunOutcome, SuspendedPayload};
pub use script::{ProcessScriptRunner, ScriptOutcome, ScriptRunner};
pub use workspace::SessionWorkspace;
