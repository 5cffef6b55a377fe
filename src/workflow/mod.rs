//! Workflow Definition Module
//!
//! Provides the data structures that describe a demo-building session:
//! the nodes it visits, how they connect, the context threaded through
//! them, and the checkpoint taken while waiting for a human.
//!
//! # Structure
//!
//! - [`node`]: Named units of work
//! - [`graph`]: Transition table, loop bounds and graph validation
//! - [`context`]: Additive session state
//! - [`checkpoint`]: Durable suspension snapshots

pub mod checkpoint;
pub mod context;
pub mod graph;
pub mod node;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, SessionId};
pub use context::{fields, Context, ContextPatch};
pub use graph::{next_node, Branch, Edge, LoopLimits, ENTRY};
pub use node::Node;
