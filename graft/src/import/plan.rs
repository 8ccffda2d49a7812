//! Decisions produced by preflight and consumed by commit.
//!
//! Everything here serializes, so a plan can be shown to a user, stored, and
//! handed back to [`commit`](super::ImportNegotiator::commit) unchanged.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::{NodeInfo, RootContext};
use crate::document::DocumentHeader;
use crate::extension::{Extension, ExtensionAcceptance};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TargetDecision {
    /// No node with the document's identifier exists; attach a new one below
    /// `target`.
    Create {
        target: Address,
        name: String,
        node_type: String,
    },
    /// The node exists at `existing`; the write goes to its current parent.
    Merge { existing: Address, parent: Address },
}

impl TargetDecision {
    /// Address the payload is materialized under.
    pub fn target(&self) -> &Address {
        match self {
            TargetDecision::Create { target, .. } => target,
            TargetDecision::Merge { parent, .. } => parent,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, TargetDecision::Merge { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPlan {
    pub header: DocumentHeader,
    pub decision: TargetDecision,
    /// One entry per extension block, in document order.
    pub extensions: Vec<ExtensionAcceptance>,
    /// True when the target was derived from the recorded source address
    /// rather than given by the caller.
    pub default_target: bool,
}

impl ImportPlan {
    pub fn target(&self) -> &Address {
        self.decision.target()
    }

    /// Version mismatches that need confirmation before commit.
    pub fn warnings(&self) -> Vec<&ExtensionAcceptance> {
        self.extensions.iter().filter(|a| a.is_warning()).collect()
    }

    pub fn needs_confirmation(&self) -> bool {
        self.extensions.iter().any(ExtensionAcceptance::is_warning)
    }

    pub fn acceptance(&self, extension: Extension) -> Option<&ExtensionAcceptance> {
        self.extensions
            .iter()
            .find(|a| a.extension() == Some(extension))
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedRoot {
    pub root: RootContext,
    /// Top-level node written by the import.
    pub node: NodeInfo,
    pub decision: TargetDecision,
}
