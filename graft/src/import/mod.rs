//! Two-phase partial import.
//!
//! [`ImportNegotiator::preflight`] reads only the document skeleton and
//! returns an [`ImportPlan`] without touching the store.
//! [`ImportNegotiator::commit`] re-opens the document and materializes the
//! payload according to that plan.

pub mod negotiator;
pub mod observer;
pub mod plan;

pub use negotiator::ImportNegotiator;
pub use observer::{ImportObserver, LoggingObserver};
pub use plan::{ImportPlan, ImportedRoot, TargetDecision};
