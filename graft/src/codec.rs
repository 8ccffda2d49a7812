//! Boundary to the content store.
//!
//! The store and its node (de)serializer are external collaborators. This
//! module only fixes the shape of what the export/import core needs from
//! them; `graft-store` ships a file-backed implementation.

use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::address::SITES_ROOT_PATH;
use crate::error::Result;
use crate::filter::NodeTypeFilter;

/// Open document being written. Payload producers write elements directly
/// into it; nothing is buffered beyond the writer itself.
pub type XmlSink<'a> = Writer<&'a mut dyn Write>;

/// Open document being read, positioned by the caller.
pub type XmlSource = Reader<Box<dyn BufRead>>;

/// A named root container ("site") and the workspace it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootContext {
    /// Node name, also the first segment of every address inside it.
    pub node_name: String,
    /// Human readable name.
    pub name: String,
    /// Key of the package that carries the container's resources.
    pub resources_key: String,
    pub workspace: String,
}

impl RootContext {
    pub fn root_path(&self) -> String {
        format!("{}/{}", SITES_ROOT_PATH, self.node_name)
    }

    /// True when `path` is the container node or lies beneath it.
    pub fn contains(&self, path: &str) -> bool {
        let root = self.root_path();
        path == root || path.starts_with(&format!("{}/", root))
    }
}

/// Read-only snapshot of a store node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Stable identifier, independent of where the node lives.
    pub identifier: String,
    /// Node name, the last segment of `path`.
    pub name: String,
    /// Absolute store path.
    pub path: String,
    pub parent_path: Option<String>,
    pub node_type: String,
    /// Display name (title, falling back to the node name).
    pub label: String,
}

pub trait TreeCodec {
    /// All root containers whose node name equals `node_name`.
    fn root_containers(&self, node_name: &str) -> Vec<RootContext>;

    /// Node at an absolute path, regardless of root container.
    fn node_at(&self, path: &str) -> Option<NodeInfo>;

    fn lookup_by_identifier(&self, context: &RootContext, identifier: &str) -> Option<NodeInfo>;

    fn lookup_by_path(&self, context: &RootContext, path: &str) -> Option<NodeInfo> {
        if !context.contains(path) {
            return None;
        }
        self.node_at(path)
    }

    /// Direct children of the node at `path`, in store order.
    fn child_nodes(&self, path: &str) -> Vec<NodeInfo>;

    /// Write the subtree rooted at `path` into `sink`.
    ///
    /// Binary resources are copied into `resource_dir` when given and
    /// inlined otherwise.
    fn serialize_subtree(
        &self,
        path: &str,
        workspace: &str,
        sink: &mut XmlSink<'_>,
        filter: Option<&NodeTypeFilter>,
        resource_dir: Option<&Path>,
    ) -> Result<()>;

    /// Materialize the payload the reader is positioned in under
    /// `target_path`. Consumes events up to and including the end tag of the
    /// enclosing element. Returns the first top-level node written.
    fn deserialize_subtree(
        &mut self,
        source: &mut XmlSource,
        target_path: &str,
        resource_dir: Option<&Path>,
    ) -> Result<Option<NodeInfo>>;

    /// Create the workspace if missing. Returns true when it was created.
    fn ensure_workspace(&mut self, name: &str) -> Result<bool>;

    fn current_address(&self, node: &NodeInfo) -> String {
        node.path.clone()
    }

    fn parent_address(&self, node: &NodeInfo) -> Option<String> {
        node.parent_path.clone()
    }
}
