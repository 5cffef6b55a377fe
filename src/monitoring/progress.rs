//! Progress events for callers watching a session.

use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::workflow::checkpoint::SessionId;
use crate::workflow::node::Node;

/// Emitted once per node visit.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Progress {
    pub session_id: SessionId,
    pub node: Node,
    pub message: String,
}

impl Progress {
    pub fn new(session_id: &SessionId, node: Node) -> Self {
        Self {
            session_id: session_id.clone(),
            node,
            message: node.progress_message().to_string(),
        }
    }
}

/// Sends an event if anyone is listening. A closed channel is ignored.
pub fn report(sender: Option<&Sender<Progress>>, session_id: &SessionId, node: Node) {
    if let Some(tx) = sender {
        let _ = tx.send(Progress::new(session_id, node));
    }
}
