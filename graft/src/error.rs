use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid address: \"{0}\"")]
    InvalidAddress(String),

    #[error("Unable to locate root container \"{name}\" ({matches} matches)")]
    AmbiguousOrMissingRoot { name: String, matches: usize },

    #[error("Root container not found: {0}")]
    RootNotFound(String),

    #[error("Source node not found: {0}")]
    SourceNodeNotFound(String),

    #[error("Extension package \"{0}\" is not installed")]
    ExtensionNotInstalled(String),

    #[error("Extension package \"{0}\" is not supported")]
    UnsupportedExtension(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unable to read document attribute \"{0}\"")]
    MissingMetadata(String),

    #[error(
        "Target {target} conflicts with an existing copy of the node at {existing}; \
         moving a node to a different place is not supported"
    )]
    ConflictingTarget { target: String, existing: String },

    #[error("Import incomplete: {0}")]
    ImportIncomplete(String),

    #[error("Package \"{0}\" is not active")]
    PackageNotActive(String),

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Target node not found: {0}")]
    TargetNotFound(String),

    #[error(
        "Root container resources key \"{local}\" does not match the one in the document (\"{document}\")"
    )]
    RootKeyMismatch { local: String, document: String },

    #[error(
        "Version mismatch for \"{package}\" was not confirmed (installed {installed}, document {declared})"
    )]
    UnconfirmedVersionMismatch {
        package: String,
        installed: String,
        declared: String,
    },

    #[error("Tree codec error: {0}")]
    Codec(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of [`Error`] for callers that branch on the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAddress,
    AmbiguousOrMissingRoot,
    RootNotFound,
    SourceNodeNotFound,
    ExtensionNotInstalled,
    UnsupportedExtension,
    MalformedDocument,
    MissingMetadata,
    ConflictingTarget,
    ImportIncomplete,
    PackageNotActive,
    DocumentNotFound,
    TargetNotFound,
    RootKeyMismatch,
    UnconfirmedVersionMismatch,
    Codec,
    Config,
    Io,
    Xml,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAddress => "invalid_address",
            ErrorKind::AmbiguousOrMissingRoot => "ambiguous_or_missing_root",
            ErrorKind::RootNotFound => "root_not_found",
            ErrorKind::SourceNodeNotFound => "source_node_not_found",
            ErrorKind::ExtensionNotInstalled => "extension_not_installed",
            ErrorKind::UnsupportedExtension => "unsupported_extension",
            ErrorKind::MalformedDocument => "malformed_document",
            ErrorKind::MissingMetadata => "missing_metadata",
            ErrorKind::ConflictingTarget => "conflicting_target",
            ErrorKind::ImportIncomplete => "import_incomplete",
            ErrorKind::PackageNotActive => "package_not_active",
            ErrorKind::DocumentNotFound => "document_not_found",
            ErrorKind::TargetNotFound => "target_not_found",
            ErrorKind::RootKeyMismatch => "root_key_mismatch",
            ErrorKind::UnconfirmedVersionMismatch => "unconfirmed_version_mismatch",
            ErrorKind::Codec => "codec",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Xml => "xml",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Error::AmbiguousOrMissingRoot { .. } => ErrorKind::AmbiguousOrMissingRoot,
            Error::RootNotFound(_) => ErrorKind::RootNotFound,
            Error::SourceNodeNotFound(_) => ErrorKind::SourceNodeNotFound,
            Error::ExtensionNotInstalled(_) => ErrorKind::ExtensionNotInstalled,
            Error::UnsupportedExtension(_) => ErrorKind::UnsupportedExtension,
            Error::MalformedDocument(_) => ErrorKind::MalformedDocument,
            Error::MissingMetadata(_) => ErrorKind::MissingMetadata,
            Error::ConflictingTarget { .. } => ErrorKind::ConflictingTarget,
            Error::ImportIncomplete(_) => ErrorKind::ImportIncomplete,
            Error::PackageNotActive(_) => ErrorKind::PackageNotActive,
            Error::DocumentNotFound(_) => ErrorKind::DocumentNotFound,
            Error::TargetNotFound(_) => ErrorKind::TargetNotFound,
            Error::RootKeyMismatch { .. } => ErrorKind::RootKeyMismatch,
            Error::UnconfirmedVersionMismatch { .. } => ErrorKind::UnconfirmedVersionMismatch,
            Error::Codec(_) => ErrorKind::Codec,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Xml(_) => ErrorKind::Xml,
        }
    }
}
