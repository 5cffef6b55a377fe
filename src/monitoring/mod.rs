//! Monitoring Module
//!
//! Visibility into a running session.
//!
//! # Components
//!
//! - [`Progress`]: Per-node status events for interactive callers
//! - [`ExecutionTimeline`]: Node visit timing for Gantt summaries

pub mod progress;
pub mod timeline;

pub use progress::Progress;
pub use timeline::{EventType, ExecutionTimeline, TimelineEvent, Visit};
