//! Export request and result types.

use std::path::PathBuf;

use crate::address::Address;
use crate::document::DocumentHeader;
use crate::extension::Extension;
use crate::filter::NodeTypeFilter;

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: Address,
    pub node_type_filter: Option<NodeTypeFilter>,
    /// Requested extensions, in the order their blocks are written.
    pub extensions: Vec<Extension>,
    /// Indent the document.
    pub tidy: bool,
}

impl ExportRequest {
    pub fn new(source: Address) -> Self {
        Self {
            source,
            node_type_filter: None,
            extensions: Vec::new(),
            tidy: true,
        }
    }

    pub fn with_filter(mut self, filter: NodeTypeFilter) -> Self {
        self.node_type_filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    /// Add an extension; repeated extensions are only written once.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
        self
    }

    pub fn with_tidy(mut self, tidy: bool) -> Self {
        self.tidy = tidy;
        self
    }
}

/// Where the document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDestination {
    File(PathBuf),
    /// `Private/Content/<filename>` inside an active package.
    Package {
        package_key: String,
        filename: Option<String>,
    },
    /// Returned as a string, resources inlined.
    Text,
}

/// Everything validated before the first byte is written.
#[derive(Debug, Clone)]
pub struct PreparedExport {
    pub header: DocumentHeader,
    pub source: Address,
    pub workspace: String,
    pub node_type_filter: Option<NodeTypeFilter>,
    /// Requested extensions with their locally installed version.
    pub extensions: Vec<(Extension, String)>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub source: Address,
    pub source_identifier: String,
    pub document: PathBuf,
    pub resource_dir: PathBuf,
    pub extensions: Vec<(Extension, String)>,
}

#[derive(Debug, Clone)]
pub enum ExportOutput {
    Written(ExportSummary),
    Text(String),
}
