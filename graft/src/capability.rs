//! Local capability (package) registry boundary.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::PackagesConfig;

pub trait CapabilityRegistry {
    /// Installed version of `package`, `None` when it is not installed.
    fn installed_version(&self, package: &str) -> Option<String>;

    fn is_package_active(&self, package_key: &str) -> bool;
}

/// Registry backed by a fixed table, usually read from the `[packages]`
/// config section.
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    versions: BTreeMap<String, String>,
    active: BTreeSet<String>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PackagesConfig) -> Self {
        Self {
            versions: config.installed.clone(),
            active: config.active.iter().cloned().collect(),
        }
    }

    pub fn with_package(mut self, package: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(package.into(), version.into());
        self
    }

    pub fn with_active(mut self, package_key: impl Into<String>) -> Self {
        self.active.insert(package_key.into());
        self
    }
}

impl CapabilityRegistry for InstalledPackages {
    fn installed_version(&self, package: &str) -> Option<String> {
        self.versions
            .get(package)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn is_package_active(&self, package_key: &str) -> bool {
        self.active.contains(package_key)
    }
}
