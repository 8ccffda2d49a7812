pub mod export;
pub mod import;

pub use export::{run_export, ExportArgs};
pub use import::{run_import, ImportArgs};
