//! Workflow Graph
//!
//! The workflow is a fixed table of `(node, edge)` entries. Edges are
//! either unconditional or a [`Branch`] whose predicate reads the
//! [`Context`]. Keeping the graph as data lets the transition logic be
//! tested without running any step.
//!
//! Both branch points also enforce a loop bound from [`LoopLimits`]:
//! routing back into a loop past its bound is a fatal "giving up" error.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::debug;

use super::context::{fields, Context};
use super::node::Node;
use crate::error::WorkflowError;

/// The node every session starts at.
pub const ENTRY: Node = Node::GenerateScenario;

/// A predicate deciding a conditional edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    /// True when the review step approved the scenario.
    Approved,
    /// True when the last script run left no failure detail.
    ScriptSucceeded,
}

impl Branch {
    /// Evaluates the predicate against the current context.
    pub fn evaluate(&self, context: &Context) -> bool {
        match self {
            Self::Approved => context.get_bool(fields::APPROVED),
            Self::ScriptSucceeded => !context.has_failure(),
        }
    }
}

/// Outgoing edge rule of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Always advance to the given node.
    Next(Node),
    /// Advance to `when_true` or `when_false` depending on the predicate.
    Conditional {
        branch: Branch,
        when_true: Node,
        when_false: Node,
    },
    /// No outgoing edge.
    Terminal,
}

/// Returns the outgoing edge of a node.
pub fn edge(node: Node) -> Edge {
    use Node::*;

    match node {
        GenerateScenario => Edge::Next(PresentScenario),
        PresentScenario => Edge::Next(AwaitApproval),
        AwaitApproval => Edge::Conditional {
            branch: Branch::Approved,
            when_true: GenerateDatasetScript,
            when_false: GenerateScenario,
        },
        GenerateDatasetScript => Edge::Next(ValidateDatasetScript),
        ValidateDatasetScript => Edge::Next(RunDatasetScript),
        RunDatasetScript => Edge::Conditional {
            branch: Branch::ScriptSucceeded,
            when_true: GenerateDocumentData,
            when_false: RepairDatasetScript,
        },
        RepairDatasetScript => Edge::Next(RunDatasetScript),
        GenerateDocumentData => Edge::Next(UploadData),
        UploadData => Edge::Next(GenerateSemanticModel),
        GenerateSemanticModel => Edge::Next(ValidateSemanticModel),
        ValidateSemanticModel => Edge::Next(PublishSemanticModel),
        PublishSemanticModel => Edge::Next(PublishSearchIndex),
        PublishSearchIndex => Edge::Next(GenerateAgentDescription),
        GenerateAgentDescription => Edge::Next(RegisterAgent),
        RegisterAgent => Edge::Next(PresentResults),
        PresentResults => Edge::Next(End),
        End => Edge::Terminal,
    }
}

/// Every node reachable in one transition from `node`.
pub fn successors(node: Node) -> Vec<Node> {
    match edge(node) {
        Edge::Next(next) => vec![next],
        Edge::Conditional {
            when_true,
            when_false,
            ..
        } => vec![when_true, when_false],
        Edge::Terminal => Vec::new(),
    }
}

/// Iteration bounds for the two loops of the graph.
///
/// `None` disables the bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopLimits {
    /// Maximum number of script repairs per session.
    pub max_repair_attempts: Option<u32>,
    /// Maximum number of approval reviews per session.
    pub max_approval_rounds: Option<u32>,
}

impl LoopLimits {
    pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 5;
    pub const DEFAULT_MAX_APPROVAL_ROUNDS: u32 = 10;

    /// No iteration cap on either loop.
    pub fn unbounded() -> Self {
        Self {
            max_repair_attempts: None,
            max_approval_rounds: None,
        }
    }
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_repair_attempts: Some(Self::DEFAULT_MAX_REPAIR_ATTEMPTS),
            max_approval_rounds: Some(Self::DEFAULT_MAX_APPROVAL_ROUNDS),
        }
    }
}

/// Selects the node that follows `node` given the current context.
///
/// Returns `Node::End` for the terminal node itself.
pub fn next_node(node: Node, context: &Context, limits: &LoopLimits) -> Result<Node, WorkflowError> {
    let next = match edge(node) {
        Edge::Next(next) => next,
        Edge::Terminal => Node::End,
        Edge::Conditional {
            branch,
            when_true,
            when_false,
        } => {
            let taken = branch.evaluate(context);
            debug!("{} branch {:?} evaluated to {}", node, branch, taken);

            if taken {
                when_true
            } else {
                check_loop_bound(branch, context, limits)?;
                when_false
            }
        }
    };

    Ok(next)
}

/// Fails once a loop has been re-entered as many times as its bound allows.
fn check_loop_bound(branch: Branch, context: &Context, limits: &LoopLimits) -> Result<(), WorkflowError> {
    match branch {
        Branch::ScriptSucceeded => {
            let attempts = context.get_u32(fields::REPAIR_ATTEMPTS);
            if let Some(max) = limits.max_repair_attempts {
                if attempts >= max {
                    return Err(WorkflowError::RepairLimitReached {
                        attempts,
                        last_failure: context.failure_detail().to_string(),
                    });
                }
            }
        }
        Branch::Approved => {
            let rounds = context.get_u32(fields::APPROVAL_ROUNDS);
            if let Some(max) = limits.max_approval_rounds {
                if rounds >= max {
                    return Err(WorkflowError::ApprovalLimitReached { rounds });
                }
            }
        }
    }
    Ok(())
}

/// Structural problems in the transition table.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    Unreachable(Node),
    CannotTerminate(Node),
    DegenerateBranch(Node),
    TerminalHasEdge(Node),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(node) => write!(f, "Node '{}' is not reachable from '{}'", node, ENTRY),
            Self::CannotTerminate(node) => write!(f, "Node '{}' has no path to the terminal node", node),
            Self::DegenerateBranch(node) => {
                write!(f, "Node '{}' has a conditional edge with identical targets", node)
            }
            Self::TerminalHasEdge(node) => write!(f, "Terminal node '{}' has an outgoing edge", node),
        }
    }
}

/// Validates the transition table.
///
/// Checks that:
/// 1. Every node is reachable from the entry node
/// 2. The terminal node is reachable from every node
/// 3. No conditional edge has two identical targets
/// 4. Only the terminal node lacks an outgoing edge
pub fn validate() -> Result<(), Vec<GraphError>> {
    let mut errors = Vec::new();

    for node in Node::ALL {
        match edge(node) {
            Edge::Conditional {
                when_true,
                when_false,
                ..
            } if when_true == when_false => errors.push(GraphError::DegenerateBranch(node)),
            Edge::Terminal if !node.is_terminal() => errors.push(GraphError::CannotTerminate(node)),
            Edge::Next(_) | Edge::Conditional { .. } if node.is_terminal() => {
                errors.push(GraphError::TerminalHasEdge(node))
            }
            _ => {}
        }
    }

    // Forward reachability from the entry
    let reachable = reachable_from(ENTRY, successors);
    for node in Node::ALL {
        if !reachable.contains(&node) {
            errors.push(GraphError::Unreachable(node));
        }
    }

    // Backward reachability from the terminal
    let predecessors = |target: Node| -> Vec<Node> {
        Node::ALL
            .into_iter()
            .filter(|n| successors(*n).contains(&target))
            .collect()
    };
    let terminating = reachable_from(Node::End, predecessors);
    for node in Node::ALL {
        if !terminating.contains(&node) && !errors.contains(&GraphError::CannotTerminate(node)) {
            errors.push(GraphError::CannotTerminate(node));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Breadth-first closure of `start` under `neighbours`.
fn reachable_from(start: Node, neighbours: impl Fn(Node) -> Vec<Node>) -> HashSet<Node> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for next in neighbours(node) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    seen
}
