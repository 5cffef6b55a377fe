//! Execution Timeline
//!
//! Records when each node visit of a run segment starts and ends, so a
//! session can log where its time went. Nodes inside the approval and
//! repair loops may be visited more than once; every visit is kept.

use std::time::{Duration, Instant};

use crate::workflow::node::Node;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    Completed,
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub node: Node,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// One finished node visit.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub node: Node,
    /// Offset of the visit start from the timeline start
    pub offset: Duration,
    pub duration: Duration,
    pub failed: bool,
}

/// Timing of the node visits of one run segment.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn add_event(&mut self, node: Node, event_type: EventType) {
        self.events.push(TimelineEvent {
            node,
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Pairs each start with the next end event of the same node, in visit order.
    /// A visit with no end event yet is left out.
    pub fn visits(&self) -> Vec<Visit> {
        let mut visits = Vec::new();
        let mut open: Option<&TimelineEvent> = None;

        for event in &self.events {
            match event.event_type {
                EventType::Started => open = Some(event),
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = open.filter(|s| s.node == event.node) {
                        visits.push(Visit {
                            node: event.node,
                            offset: start.timestamp.duration_since(self.start_time),
                            duration: event.timestamp.duration_since(start.timestamp),
                            failed: event.event_type == EventType::Failed,
                        });
                        open = None;
                    }
                }
            }
        }

        visits
    }

    /// Number of completed or failed visits of `node`.
    pub fn visit_count(&self, node: Node) -> usize {
        self.visits().iter().filter(|v| v.node == node).count()
    }

    /// Generates an ASCII Gantt chart, one row per visit.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        for visit in self.visits() {
            let start_pos = (visit.offset.as_millis() as f64 * scale) as usize;
            let width = (visit.duration.as_millis() as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&if visit.failed { "x" } else { "#" }.repeat(width));

            output.push_str(&format!(
                "{} |{}| ({} ms)\n",
                truncate(visit.node.name(), 24),
                bar,
                visit.duration.as_millis()
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a name to a fixed width.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
