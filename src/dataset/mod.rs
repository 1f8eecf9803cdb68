//! insight Datasets
//!
//! Record schemas and the collaborators that feed the query engine:
//!
//! - **types**: `CourseSection`, `Room`, `Records`, `Dataset` and the `Record` trait
//! - **store**: `DatasetProvider` trait, in-memory provider, directory-backed registry
//! - **import**: course section CSV exports, zip archives of them, and JSON record arrays
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use insight::dataset::{import_files, DatasetKind, DatasetStore};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DatasetStore::open("./data").await?;
//!     let records = import_files(DatasetKind::Courses, &[PathBuf::from("CPSC310.csv")]).await?;
//!     let info = store.add_dataset("courses", records).await?;
//!     println!("Added {} sections", info.num_rows);
//!     Ok(())
//! }
//! ```

mod error;
mod import;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{DatasetError, DatasetResult};
pub use import::{
    import_files, is_zip_archive, parse_courses_csv, parse_courses_zip, parse_records_json,
    parse_upload, CourseImport, COURSES_HEADER,
};
pub use store::{validate_id, DatasetProvider, DatasetStore, MemoryProvider, RESERVED_WORDS};
pub use types::{
    CourseSection, Dataset, DatasetInfo, DatasetKind, FieldRef, Record, Records, Room,
};
