//! Partial subtree export.

pub mod envelope;
pub mod types;

pub use envelope::ExportEnvelopeBuilder;
pub use types::{ExportDestination, ExportOutput, ExportRequest, ExportSummary, PreparedExport};
