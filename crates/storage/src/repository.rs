use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracker_core::model::{
    ActivityDelta, ActivityHistory, Course, CourseCompletionData, CourseId, Settings,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted completion record together with its snapshot revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCompletion {
    pub data: CourseCompletionData,
    pub revision: u64,
}

/// Result of a revision-guarded save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Applied,
    /// A snapshot with an equal or newer revision is already stored; nothing was written.
    Superseded { stored_revision: u64 },
}

/// Repository contract for per-course completion records.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Fetch the stored record for a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or decoded.
    async fn load_completion(&self, id: CourseId) -> Result<Option<StoredCompletion>, StorageError>;

    /// Store `data` as snapshot `revision` if it is newer than what is stored.
    ///
    /// When applied, the difference in study time and completed chapters
    /// against the previously stored record is folded into the activity
    /// history under `today`, atomically with the record itself.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_completion(
        &self,
        course: &Course,
        data: &CourseCompletionData,
        revision: u64,
        today: NaiveDate,
    ) -> Result<SaveOutcome, StorageError>;
}

/// Repository contract for the cross-course activity history.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be read.
    async fn activity_history(&self) -> Result<ActivityHistory, StorageError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if settings cannot be read or fail validation.
    async fn get_settings(&self) -> Result<Option<Settings>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if settings cannot be stored.
    async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError>;
}

/// Repository contract for the set of courses shown on the overview.
#[async_trait]
pub trait ActiveCourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be read.
    async fn active_courses(&self) -> Result<BTreeSet<CourseId>, StorageError>;

    /// Add or remove one course. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn set_course_active(&self, id: CourseId, active: bool) -> Result<(), StorageError>;

    /// Replace the whole set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn replace_active_courses(&self, ids: &BTreeSet<CourseId>) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    completions: Arc<Mutex<HashMap<CourseId, StoredCompletion>>>,
    activity: Arc<Mutex<ActivityHistory>>,
    settings: Arc<Mutex<Option<Settings>>>,
    active: Arc<Mutex<BTreeSet<CourseId>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn load_completion(&self, id: CourseId) -> Result<Option<StoredCompletion>, StorageError> {
        let guard = self.completions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn save_completion(
        &self,
        course: &Course,
        data: &CourseCompletionData,
        revision: u64,
        today: NaiveDate,
    ) -> Result<SaveOutcome, StorageError> {
        let mut completions = self.completions.lock().map_err(poisoned)?;
        let previous = completions.get(&course.id).cloned().unwrap_or_default();
        if completions.contains_key(&course.id) && previous.revision >= revision {
            return Ok(SaveOutcome::Superseded {
                stored_revision: previous.revision,
            });
        }

        let delta = ActivityDelta::between(course, &previous.data, data, today);
        if !delta.is_empty() {
            let mut activity = self.activity.lock().map_err(poisoned)?;
            activity.apply(today, delta);
        }

        completions.insert(
            course.id,
            StoredCompletion {
                data: data.clone(),
                revision,
            },
        );
        Ok(SaveOutcome::Applied)
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn activity_history(&self) -> Result<ActivityHistory, StorageError> {
        let guard = self.activity.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(&self) -> Result<Option<Settings>, StorageError> {
        let guard = self.settings.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        let mut guard = self.settings.lock().map_err(poisoned)?;
        *guard = Some(settings.clone());
        Ok(())
    }
}

#[async_trait]
impl ActiveCourseRepository for InMemoryRepository {
    async fn active_courses(&self) -> Result<BTreeSet<CourseId>, StorageError> {
        let guard = self.active.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn set_course_active(&self, id: CourseId, active: bool) -> Result<(), StorageError> {
        let mut guard = self.active.lock().map_err(poisoned)?;
        if active {
            guard.insert(id);
        } else {
            guard.remove(&id);
        }
        Ok(())
    }

    async fn replace_active_courses(&self, ids: &BTreeSet<CourseId>) -> Result<(), StorageError> {
        let mut guard = self.active.lock().map_err(poisoned)?;
        guard.clone_from(ids);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub completions: Arc<dyn CompletionRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub active: Arc<dyn ActiveCourseRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo.clone());
        let activity: Arc<dyn ActivityRepository> = Arc::new(repo.clone());
        let settings: Arc<dyn SettingsRepository> = Arc::new(repo.clone());
        let active: Arc<dyn ActiveCourseRepository> = Arc::new(repo);
        Self {
            completions,
            activity,
            settings,
            active,
        }
    }
}
