pub mod catalog;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod report;
pub mod store;
pub mod system_db;

pub use catalog::{builtin_catalog, parse_catalog, Catalog};
pub use document::StoredDocument;
pub use error::{KioskDbError, Result};
pub use filter::Filter;
pub use flatten::{LogicalRecord, RecordId, RecordSet, UploadMode};
pub use store::{Collection, Created, Page, PageRequest, Pagination, Store};
