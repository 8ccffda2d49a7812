use tracing::info;

use super::plan::ImportedRoot;

/// Receives one notification per successful commit.
pub trait ImportObserver {
    fn on_imported(&self, imported: &ImportedRoot);
}

/// Logs every import through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ImportObserver for LoggingObserver {
    fn on_imported(&self, imported: &ImportedRoot) {
        info!(
            root = %imported.root.node_name,
            identifier = %imported.node.identifier,
            path = %imported.node.path,
            merged = imported.decision.is_merge(),
            "Node imported"
        );
    }
}
