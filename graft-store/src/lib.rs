//! File-backed reference content store for graft.
//!
//! [`ContentStore`] keeps root containers, workspaces and nodes in one JSON
//! file and implements [`graft::TreeCodec`], so it can be the source of an
//! export and the target of an import.
//!
//! ```no_run
//! use graft::{ExportEnvelopeBuilder, ExportRequest, Address, InstalledPackages};
//! use graft_store::ContentStore;
//!
//! # fn example() -> graft::Result<()> {
//! let store = ContentStore::open("store.json".as_ref(), "assets")?;
//! let packages = InstalledPackages::new();
//! let builder = ExportEnvelopeBuilder::new(&store, &packages);
//! let request = ExportRequest::new(Address::parse("site-a/section/page")?);
//! let xml = builder.export_to_string(&request)?;
//! # let _ = xml;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod node;
pub mod store;

pub use error::{Result, StoreError};
pub use node::{NodeRecord, SiteRecord};
pub use store::ContentStore;
