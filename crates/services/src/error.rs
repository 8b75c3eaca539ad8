//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use storage::CatalogError;
use tracker_core::model::SettingsError;

/// Errors emitted by `ProgressStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course has no textbook at index {0}")]
    UnknownTextbook(usize),
    #[error("snapshot {revision} lost to stored revision {stored_revision} after merging")]
    Superseded { revision: u64, stored_revision: u64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudySession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("course has no textbook at index {0}")]
    UnknownTextbook(usize),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted by document viewer adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ViewerError {
    #[error("failed to open document: {0}")]
    Open(String),
    #[error("failed to restore position: {0}")]
    Restore(String),
}

/// Errors emitted by `OverviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OverviewError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping tracker services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
