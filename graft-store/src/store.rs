//! JSON-persisted content store.
//!
//! Nodes are kept in a flat map keyed by absolute path, so a subtree is a
//! contiguous key range. Binary resources live as plain files in the assets
//! directory and are referenced by file name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use graft::address::SITES_ROOT_PATH;
use graft::config::default_workspace;
use graft::NodeInfo;

use crate::error::{Result, StoreError};
use crate::node::{child_path, is_valid_path, node_name, parent_path, NodeRecord, SiteRecord};

pub const SITES_NODE_TYPE: &str = "Graft:Sites";
pub const SITE_NODE_TYPE: &str = "Graft:Site";

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentStore {
    #[serde(default)]
    sites: Vec<SiteRecord>,
    #[serde(default)]
    workspaces: BTreeSet<String>,
    #[serde(default)]
    nodes: BTreeMap<String, NodeRecord>,

    #[serde(skip)]
    location: Option<PathBuf>,
    #[serde(skip)]
    assets_dir: PathBuf,
    #[serde(skip, default = "default_workspace")]
    workspace: String,
}

impl ContentStore {
    /// Empty in-memory store.
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            sites: Vec::new(),
            workspaces: BTreeSet::new(),
            nodes: BTreeMap::new(),
            location: None,
            assets_dir: assets_dir.into(),
            workspace: default_workspace(),
        }
    }

    /// Open the store file at `path`, starting empty when it does not exist.
    #[instrument(skip(assets_dir))]
    pub fn open(path: &Path, assets_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut store = if path.exists() {
            let content = fs::read_to_string(path)?;
            let store: ContentStore = serde_json::from_str(&content)?;
            debug!(nodes = store.nodes.len(), sites = store.sites.len(), "Store loaded");
            store
        } else {
            info!("Store file not found, starting empty");
            ContentStore::new(PathBuf::new())
        };
        store.location = Some(path.to_path_buf());
        store.assets_dir = assets_dir.into();
        Ok(store)
    }

    /// Workspace reported to callers in root contexts.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Persist to the file the store was opened from.
    pub fn save(&self) -> Result<()> {
        let path = self
            .location
            .as_ref()
            .ok_or_else(|| StoreError::InvalidPath("store has no file location".to_string()))?;
        self.save_to(path)
    }

    /// Write the store to `path`, replacing the file atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(temp.as_file_mut(), self)?;
        temp.as_file_mut().flush()?;
        temp.persist(path)?;
        debug!(path = %path.display(), nodes = self.nodes.len(), "Store saved");
        Ok(())
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &str> {
        self.workspaces.iter().map(String::as_str)
    }

    /// Add a workspace. Returns false when it already existed.
    pub fn add_workspace(&mut self, name: &str) -> bool {
        self.workspaces.insert(name.to_string())
    }

    pub fn sites(&self) -> &[SiteRecord] {
        &self.sites
    }

    /// Register a root container and create its node below `/sites`.
    pub fn add_site(
        &mut self,
        node_name: &str,
        name: &str,
        resources_package_key: &str,
    ) -> Result<NodeInfo> {
        if self.sites.iter().any(|s| s.node_name == node_name) {
            return Err(StoreError::AlreadyExists(node_name.to_string()));
        }
        self.ensure_top_level(SITES_ROOT_PATH, SITES_NODE_TYPE)?;
        let info = self.create_node(
            SITES_ROOT_PATH,
            node_name,
            NodeRecord::new(new_identifier(), SITE_NODE_TYPE).with_property("title", name),
        )?;
        self.sites.push(SiteRecord {
            node_name: node_name.to_string(),
            name: name.to_string(),
            resources_package_key: resources_package_key.to_string(),
        });
        Ok(info)
    }

    /// Create a top-level node such as `/sites` or `/taxonomies` unless it
    /// exists.
    pub fn ensure_top_level(&mut self, path: &str, node_type: &str) -> Result<NodeInfo> {
        if !is_valid_path(path) || parent_path(path).is_some() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let record = self
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| NodeRecord::new(new_identifier(), node_type));
        Ok(record.to_info(path))
    }

    /// Create `name` below `parent`. Fails when the parent is missing or the
    /// node exists.
    pub fn create_node(&mut self, parent: &str, name: &str, record: NodeRecord) -> Result<NodeInfo> {
        let path = child_path(parent, name);
        if self.nodes.contains_key(&path) {
            return Err(StoreError::AlreadyExists(path));
        }
        self.put_node(&path, record)
    }

    /// Insert or overwrite the node at `path`. The parent must exist.
    pub fn put_node(&mut self, path: &str, record: NodeRecord) -> Result<NodeInfo> {
        if !is_valid_path(path) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        if let Some(parent) = parent_path(path) {
            if !self.nodes.contains_key(parent) {
                return Err(StoreError::NotFound(parent.to_string()));
            }
        }
        let info = record.to_info(path);
        self.nodes.insert(path.to_string(), record);
        Ok(info)
    }

    pub fn set_property(&mut self, path: &str, key: &str, value: &str) -> Result<()> {
        let record = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        record.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Store `data` in the assets directory and reference it from the node.
    pub fn attach_resource(&mut self, path: &str, name: &str, data: &[u8]) -> Result<String> {
        let record = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let file = asset_file_name(&record.identifier, name);
        fs::create_dir_all(&self.assets_dir)?;
        fs::write(self.assets_dir.join(&file), data)?;
        record.resources.insert(name.to_string(), file.clone());
        Ok(file)
    }

    pub fn node(&self, path: &str) -> Option<&NodeRecord> {
        self.nodes.get(path)
    }

    pub fn info(&self, path: &str) -> Option<NodeInfo> {
        self.nodes.get(path).map(|record| record.to_info(path))
    }

    /// First node carrying `identifier` whose path satisfies `within`.
    pub fn find_by_identifier(
        &self,
        identifier: &str,
        within: impl Fn(&str) -> bool,
    ) -> Option<NodeInfo> {
        self.nodes
            .iter()
            .find(|(path, record)| record.identifier == identifier && within(path.as_str()))
            .map(|(path, record)| record.to_info(path))
    }

    /// Direct children of `path`, ordered by name.
    pub fn children(&self, path: &str) -> Vec<NodeInfo> {
        self.subtree_paths(path)
            .filter(|p| parent_path(p) == Some(path))
            .filter_map(|p| self.info(p))
            .collect()
    }

    /// Paths strictly below `path`.
    fn subtree_paths<'s>(&'s self, path: &str) -> impl Iterator<Item = &'s String> + 's {
        let prefix = format!("{}/", path);
        self.nodes
            .range(prefix.clone()..)
            .map(|(p, _)| p)
            .take_while(move |p| p.starts_with(&prefix))
    }

    /// Remove `path` and everything below it. Returns the number of nodes
    /// removed.
    pub fn remove_subtree(&mut self, path: &str) -> usize {
        let mut doomed: Vec<String> = self.subtree_paths(path).cloned().collect();
        if self.nodes.contains_key(path) {
            doomed.push(path.to_string());
        }
        for p in &doomed {
            self.nodes.remove(p);
        }
        debug!(path, removed = doomed.len(), "Removed subtree");
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn record_mut(&mut self, path: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(path)
    }

    pub(crate) fn contains_path(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub(crate) fn site(&self, node_name: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|s| s.node_name == node_name)
    }
}

pub fn new_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// File name of a resource inside the assets directory. Always a single
/// path component.
pub fn asset_file_name(identifier: &str, name: &str) -> String {
    format!("{}-{}", file_component(identifier), file_component(node_name(name)))
}

/// True when `file` names an entry directly inside a directory.
pub fn is_plain_file_name(file: &str) -> bool {
    let mut components = Path::new(file).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
