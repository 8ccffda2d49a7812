//! Partial subtree export and import for hierarchical content stores.
//!
//! A subtree is exported into a self-describing XML document together with
//! optional extension side trees, and later merged back into a (possibly
//! different) store in two phases: a read-only preflight that yields a
//! serializable [`ImportPlan`], then a commit that materializes the payload.
//! Node storage itself sits behind the [`TreeCodec`] boundary.

pub mod address;
pub mod capability;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod extension;
pub mod filter;
pub mod import;
pub mod resolver;

pub use address::Address;
pub use capability::{CapabilityRegistry, InstalledPackages};
pub use codec::{NodeInfo, RootContext, TreeCodec};
pub use config::Config;
pub use document::{DocumentHeader, DocumentSource};
pub use error::{Error, ErrorKind, Result};
pub use export::{ExportDestination, ExportEnvelopeBuilder, ExportOutput, ExportRequest};
pub use extension::{Extension, ExtensionAcceptance, ExtensionRegistry};
pub use filter::NodeTypeFilter;
pub use import::{ImportNegotiator, ImportObserver, ImportPlan, ImportedRoot, TargetDecision};
pub use resolver::{RootSelector, SegmentPathResolver};
