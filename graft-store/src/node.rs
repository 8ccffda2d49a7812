//! Persisted records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use graft::NodeInfo;

pub const TITLE_PROPERTY: &str = "title";
pub const NAME_PROPERTY: &str = "name";

/// A node as stored, keyed by its absolute path in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub identifier: String,
    pub node_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Resource name -> file name inside the assets directory.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

impl NodeRecord {
    pub fn new(identifier: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            node_type: node_type.into(),
            properties: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Display name: `title`, then `name`, then the node name.
    pub fn label(&self, node_name: &str) -> String {
        self.properties
            .get(TITLE_PROPERTY)
            .or_else(|| self.properties.get(NAME_PROPERTY))
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| node_name.to_string())
    }

    pub fn to_info(&self, path: &str) -> NodeInfo {
        let name = node_name(path).to_string();
        NodeInfo {
            identifier: self.identifier.clone(),
            label: self.label(&name),
            name,
            path: path.to_string(),
            parent_path: parent_path(path).map(str::to_string),
            node_type: self.node_type.clone(),
        }
    }
}

/// A root container ("site").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub node_name: String,
    pub name: String,
    pub resources_package_key: String,
}

/// Last segment of an absolute path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of an absolute path; `None` for top-level nodes.
pub fn parent_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

pub fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// True for `/a/b` style paths without empty segments.
pub fn is_valid_path(path: &str) -> bool {
    path.len() > 1 && path.starts_with('/') && path[1..].split('/').all(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_helpers() {
        assert_eq!(node_name("/sites/a/page"), "page");
        assert_eq!(parent_path("/sites/a/page"), Some("/sites/a"));
        assert_eq!(parent_path("/sites"), None);
        assert_eq!(child_path("/sites/a", "page"), "/sites/a/page");
        assert!(is_valid_path("/sites/a"));
        assert!(!is_valid_path("/sites//a"));
        assert!(!is_valid_path("sites/a"));
        assert!(!is_valid_path("/"));
    }

    #[test]
    fn test_label_fallbacks() {
        let record = NodeRecord::new("id", "Site:Page");
        assert_eq!(record.label("page"), "page");

        let record = record.with_property("name", "Named");
        assert_eq!(record.label("page"), "Named");

        let record = record.with_property("title", "Titled");
        assert_eq!(record.label("page"), "Titled");
    }

    #[test]
    fn test_to_info() {
        let info = NodeRecord::new("id-1", "Site:Page").to_info("/sites/a/page");
        assert_eq!(info.name, "page");
        assert_eq!(info.parent_path.as_deref(), Some("/sites/a"));
        assert_eq!(info.label, "page");
    }
}
