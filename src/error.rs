//! Error Types
//!
//! Two disjoint failure paths exist in a session:
//!
//! - Script execution failures are *data*. They are recorded in the
//!   `failure_detail` context field and routed to the repair step.
//! - Everything in this module is *fatal* to the session and propagates
//!   to the caller of [`Engine::start`](crate::Engine::start) or
//!   [`Engine::resume`](crate::Engine::resume).

use thiserror::Error;

use crate::llm::{GenerateError, Task};
use crate::warehouse::WarehouseError;
use crate::workflow::checkpoint::CheckpointError;
use crate::workflow::node::Node;

/// Failure raised by a single step. Always fatal to the session.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("malformed {task} output: {reason}")]
    MalformedOutput { task: Task, reason: String },

    #[error("warehouse operation failed: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("semantic model is invalid: {0}")]
    InvalidSemanticModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize step output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Session-level failure returned by the engine entry points.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("demo prompt is empty")]
    EmptyPrompt,

    #[error("invalid session id '{0}'")]
    InvalidSessionId(String),

    #[error("unknown or expired session '{0}'")]
    UnknownSession(String),

    #[error("session '{session}' is checkpointed at {node}, which does not wait for input")]
    NotSuspended { session: String, node: Node },

    #[error("step {node} failed: {source}")]
    StepFailed { node: Node, source: StepError },

    #[error("giving up after {attempts} script repair attempts; last failure: {last_failure}")]
    RepairLimitReached { attempts: u32, last_failure: String },

    #[error("giving up after {rounds} rounds of scenario feedback without approval")]
    ApprovalLimitReached { rounds: u32 },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl WorkflowError {
    /// Returns true if the failure came from a loop bound rather than a step.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            Self::RepairLimitReached { .. } | Self::ApprovalLimitReached { .. }
        )
    }

    /// Returns the node that failed, if the error originated in a step.
    pub fn failed_node(&self) -> Option<Node> {
        match self {
            Self::StepFailed { node, .. } => Some(*node),
            _ => None,
        }
    }
}
