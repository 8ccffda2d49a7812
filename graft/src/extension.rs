//! Closed set of extensions that can travel with a partial export.
//!
//! An extension is an independently versioned side tree (for example a
//! shared taxonomy) bundled next to the primary subtree. Only extensions this
//! crate knows how to serialize can be offered at all, so the set is a plain
//! enum rather than a plugin lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::capability::CapabilityRegistry;
use crate::codec::TreeCodec;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Extension {
    /// Vocabularies below the shared taxonomy root.
    Taxonomy,
}

impl Extension {
    pub const ALL: [Extension; 1] = [Extension::Taxonomy];

    /// Package id, also the `package` attribute of the extension block.
    pub fn id(&self) -> &'static str {
        match self {
            Extension::Taxonomy => "graft/taxonomy",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == id)
    }

    /// Absolute path of the side tree in the local store.
    pub fn side_tree_root(&self) -> &'static str {
        match self {
            Extension::Taxonomy => "/taxonomies",
        }
    }

    /// Element wrapping each serialized member of the side tree.
    pub fn member_element(&self) -> &'static str {
        match self {
            Extension::Taxonomy => "vocabulary",
        }
    }

    /// Node type of the side tree members that are exported.
    pub fn member_type(&self) -> &'static str {
        match self {
            Extension::Taxonomy => "Graft.Taxonomy:Vocabulary",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Extension::Taxonomy => {
                "You can include all vocabularies present in this store in the export."
            }
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Extension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s).ok_or_else(|| Error::UnsupportedExtension(s.to_string()))
    }
}

impl TryFrom<String> for Extension {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Extension> for String {
    fn from(extension: Extension) -> Self {
        extension.id().to_string()
    }
}

/// Outcome of checking one extension block against the local registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtensionAcceptance {
    Accepted {
        extension: Extension,
        version: String,
    },
    /// Installed and document versions differ; needs explicit confirmation.
    VersionMismatchWarning {
        extension: Extension,
        installed: String,
        declared: String,
    },
    RejectedUnsupported {
        package: String,
    },
    RejectedNotInstalled {
        extension: Extension,
    },
}

impl ExtensionAcceptance {
    pub fn extension(&self) -> Option<Extension> {
        match self {
            ExtensionAcceptance::Accepted { extension, .. }
            | ExtensionAcceptance::VersionMismatchWarning { extension, .. }
            | ExtensionAcceptance::RejectedNotInstalled { extension } => Some(*extension),
            ExtensionAcceptance::RejectedUnsupported { .. } => None,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ExtensionAcceptance::VersionMismatchWarning { .. })
    }

    /// Turn a rejection into its error, pass everything else through.
    pub fn into_result(self) -> Result<Self> {
        match self {
            ExtensionAcceptance::RejectedUnsupported { package } => {
                Err(Error::UnsupportedExtension(package))
            }
            ExtensionAcceptance::RejectedNotInstalled { extension } => {
                Err(Error::ExtensionNotInstalled(extension.id().to_string()))
            }
            other => Ok(other),
        }
    }
}

/// Maps extensions to their locally installed version and side tree.
pub struct ExtensionRegistry<'a> {
    capabilities: &'a dyn CapabilityRegistry,
}

impl<'a> ExtensionRegistry<'a> {
    pub fn new(capabilities: &'a dyn CapabilityRegistry) -> Self {
        Self { capabilities }
    }

    pub fn is_known(&self, id: &str) -> bool {
        Extension::from_id(id).is_some()
    }

    pub fn installed_version(&self, extension: Extension) -> Option<String> {
        self.capabilities.installed_version(extension.id())
    }

    /// Installed extensions, in declaration order.
    pub fn installed(&self) -> Vec<(Extension, String)> {
        Extension::ALL
            .into_iter()
            .filter_map(|e| self.installed_version(e).map(|v| (e, v)))
            .collect()
    }

    /// Side tree root of `extension` in the local store, if it exists.
    pub fn locate_side_tree(&self, extension: Extension, codec: &dyn TreeCodec) -> Option<String> {
        let root = extension.side_tree_root();
        let found = codec.node_at(root).map(|node| node.path);
        debug!(extension = %extension, root, found = found.is_some(), "Located side tree");
        found
    }

    /// Classify an extension block declaring `package` at `declared_version`.
    pub fn assess(&self, package: &str, declared_version: &str) -> ExtensionAcceptance {
        let Some(extension) = Extension::from_id(package) else {
            return ExtensionAcceptance::RejectedUnsupported {
                package: package.to_string(),
            };
        };
        match self.installed_version(extension) {
            None => ExtensionAcceptance::RejectedNotInstalled { extension },
            Some(installed) if installed == declared_version => ExtensionAcceptance::Accepted {
                extension,
                version: installed,
            },
            Some(installed) => ExtensionAcceptance::VersionMismatchWarning {
                extension,
                installed,
                declared: declared_version.to_string(),
            },
        }
    }
}
