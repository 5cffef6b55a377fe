//! Workflow Nodes
//!
//! Named units of work in the demo-building workflow. Node names are
//! logical roles; what each node does lives in [`crate::steps`], and how
//! nodes connect lives in [`crate::workflow::graph`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A node of the workflow graph.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    GenerateScenario,
    PresentScenario,
    AwaitApproval,
    GenerateDatasetScript,
    ValidateDatasetScript,
    RunDatasetScript,
    RepairDatasetScript,
    GenerateDocumentData,
    UploadData,
    GenerateSemanticModel,
    ValidateSemanticModel,
    PublishSemanticModel,
    PublishSearchIndex,
    GenerateAgentDescription,
    RegisterAgent,
    PresentResults,
    End,
}

impl Node {
    /// Every node, in graph order.
    pub const ALL: [Node; 17] = [
        Node::GenerateScenario,
        Node::PresentScenario,
        Node::AwaitApproval,
        Node::GenerateDatasetScript,
        Node::ValidateDatasetScript,
        Node::RunDatasetScript,
        Node::RepairDatasetScript,
        Node::GenerateDocumentData,
        Node::UploadData,
        Node::GenerateSemanticModel,
        Node::ValidateSemanticModel,
        Node::PublishSemanticModel,
        Node::PublishSearchIndex,
        Node::GenerateAgentDescription,
        Node::RegisterAgent,
        Node::PresentResults,
        Node::End,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateScenario => "GenerateScenario",
            Self::PresentScenario => "PresentScenario",
            Self::AwaitApproval => "AwaitApproval",
            Self::GenerateDatasetScript => "GenerateDatasetScript",
            Self::ValidateDatasetScript => "ValidateDatasetScript",
            Self::RunDatasetScript => "RunDatasetScript",
            Self::RepairDatasetScript => "RepairDatasetScript",
            Self::GenerateDocumentData => "GenerateDocumentData",
            Self::UploadData => "UploadData",
            Self::GenerateSemanticModel => "GenerateSemanticModel",
            Self::ValidateSemanticModel => "ValidateSemanticModel",
            Self::PublishSemanticModel => "PublishSemanticModel",
            Self::PublishSearchIndex => "PublishSearchIndex",
            Self::GenerateAgentDescription => "GenerateAgentDescription",
            Self::RegisterAgent => "RegisterAgent",
            Self::PresentResults => "PresentResults",
            Self::End => "End",
        }
    }

    /// Short human-readable status line shown when the node is visited.
    pub fn progress_message(&self) -> &'static str {
        match self {
            Self::GenerateScenario => "Generating a demo scenario...",
            Self::PresentScenario => "Preparing the demo idea for review...",
            Self::AwaitApproval => "Reviewing feedback on the demo idea...",
            Self::GenerateDatasetScript => "Generating the synthetic data script...",
            Self::ValidateDatasetScript => "Checking the synthetic data script...",
            Self::RunDatasetScript => "Running the synthetic data script...",
            Self::RepairDatasetScript => "Fixing the script after a failed run...",
            Self::GenerateDocumentData => "Generating document data...",
            Self::UploadData => "Loading data into the warehouse...",
            Self::GenerateSemanticModel => "Generating the semantic model...",
            Self::ValidateSemanticModel => "Checking the semantic model...",
            Self::PublishSemanticModel => "Publishing the semantic model...",
            Self::PublishSearchIndex => "Creating the document search index...",
            Self::GenerateAgentDescription => "Writing the agent description...",
            Self::RegisterAgent => "Registering the agent...",
            Self::PresentResults => "Wrapping up...",
            Self::End => "Done.",
        }
    }

    /// Returns true if the engine must pause for human input before running this node.
    pub fn is_suspend_point(&self) -> bool {
        matches!(self, Self::AwaitApproval)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = Node::ALL.iter().map(Node::name).collect();
        assert_eq!(names.len(), Node::ALL.len());
    }

    #[test]
    fn test_single_suspend_point_and_terminal() {
        let suspend: Vec<_> = Node::ALL.iter().filter(|n| n.is_suspend_point()).collect();
        let terminal: Vec<_> = Node::ALL.iter().filter(|n| n.is_terminal()).collect();

        assert_eq!(suspend, vec![&Node::AwaitApproval]);
        assert_eq!(terminal, vec![&Node::End]);
    }

    #[test]
    fn test_display_matches_serde_name() {
        for node in Node::ALL {
            let json = serde_json::to_string(&node).unwrap();
            assert_eq!(json, format!("\"{}\"", node));
        }
    }

    #[test]
    fn test_every_node_has_progress_message() {
        assert!(Node::ALL.iter().all(|n| !n.progress_message().is_empty()));
    }
}
