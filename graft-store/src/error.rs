//! Store error types.

use std::io;
use thiserror::Error;

/// Content store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error reading or writing the store, assets or resources
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Store file could not be (de)serialized
    #[error("Store file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Node or site not found
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Path is not absolute or has empty segments
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Node payload does not have the expected shape
    #[error("Malformed node payload: {0}")]
    Malformed(String),

    #[error("Invalid resource {name}: {reason}")]
    Resource { name: String, reason: String },
}

impl From<quick_xml::events::attributes::AttrError> for StoreError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        StoreError::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Io(err.error)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
            || matches!(self, StoreError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

impl From<StoreError> for graft::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => graft::Error::Io(e),
            other => graft::Error::Codec(other.to_string()),
        }
    }
}
