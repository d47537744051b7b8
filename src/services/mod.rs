//! Business logic services.
//!
//! Services sit between callers and the persistence switch and enforce
//! access control for privileged operations.

mod bulk_import;
mod catalog;

pub use bulk_import::{BulkImportService, LoadReport, LoadTarget};
pub use catalog::CatalogService;
