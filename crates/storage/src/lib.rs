#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;
pub mod sqlite;

pub use catalog::{CatalogError, CourseCatalog};
pub use repository::{SaveOutcome, Storage, StorageError, StoredCompletion};
