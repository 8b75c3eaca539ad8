use std::collections::BTreeSet;
use std::sync::Arc;

use storage::repository::Storage;
use storage::CourseCatalog;
use tracker_core::Clock;
use tracker_core::model::{Course, CourseId, Settings};

use crate::error::{SessionError, TrackerServicesError};
use crate::notice::{ErrorNotice, ErrorReporter};
use crate::overview::OverviewService;
use crate::progress_store::ProgressStore;
use crate::session::{SessionContext, StudySession};
use crate::settings_service::SettingsService;
use crate::viewer::ViewerSyncAdapter;

/// Assembles host-facing services over one storage backend and course directory.
#[derive(Clone)]
pub struct TrackerServices {
    clock: Clock,
    storage: Storage,
    catalog: CourseCatalog,
    reporter: Arc<dyn ErrorReporter>,
    settings: Arc<SettingsService>,
    overview: Arc<OverviewService>,
}

impl TrackerServices {
    #[must_use]
    pub fn new(
        storage: Storage,
        catalog: CourseCatalog,
        clock: Clock,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let settings = Arc::new(SettingsService::new(Arc::clone(&storage.settings)));
        let overview = Arc::new(OverviewService::new(
            clock,
            Arc::clone(&storage.completions),
            Arc::clone(&storage.activity),
            Arc::clone(&storage.settings),
        ));
        Self {
            clock,
            storage,
            catalog,
            reporter,
            settings,
            overview,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog: CourseCatalog,
        clock: Clock,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, TrackerServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, catalog, clock, reporter))
    }

    #[must_use]
    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn overview(&self) -> Arc<OverviewService> {
        Arc::clone(&self.overview)
    }

    /// Every course in the catalog, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError::Catalog` if the course directory cannot be read.
    pub async fn courses(&self) -> Result<Vec<Arc<Course>>, TrackerServicesError> {
        let courses = self.catalog.load_all().await?;
        Ok(courses.into_iter().map(Arc::new).collect())
    }

    /// # Errors
    ///
    /// Returns `TrackerServicesError::Catalog` if the course is missing or malformed.
    pub async fn course(&self, id: CourseId) -> Result<Arc<Course>, TrackerServicesError> {
        Ok(Arc::new(self.catalog.load(id).await?))
    }

    /// Courses marked active, sorted by title.
    ///
    /// An active course whose file is missing or malformed is reported and
    /// left out; it stays in the active set.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError::Storage` if the active set cannot be read.
    pub async fn active_courses(&self) -> Result<Vec<Arc<Course>>, TrackerServicesError> {
        let ids = self.storage.active.active_courses().await?;
        let mut courses = Vec::with_capacity(ids.len());
        for id in ids {
            match self.catalog.load(id).await {
                Ok(course) => courses.push(Arc::new(course)),
                Err(err) => {
                    log::warn!("skipping active course {id}: {err}");
                    self.reporter
                        .report(ErrorNotice::new(format!("Unable to load course {id}"), &err));
                }
            }
        }
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    /// Add a course to the active set, or remove it.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError::Catalog` when activating a course that
    /// is not in the catalog, or `TrackerServicesError::Storage` if the set
    /// cannot be stored.
    pub async fn set_course_active(
        &self,
        id: CourseId,
        active: bool,
    ) -> Result<(), TrackerServicesError> {
        if active {
            self.catalog.load(id).await?;
        }
        self.storage.active.set_course_active(id, active).await?;
        log::info!("course {id} is now {}", if active { "active" } else { "inactive" });
        Ok(())
    }

    /// Replace the active set with `ids`.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError::Catalog` if any course is not in the
    /// catalog, or `TrackerServicesError::Storage` if the set cannot be stored.
    pub async fn set_active_courses(
        &self,
        ids: &BTreeSet<CourseId>,
    ) -> Result<(), TrackerServicesError> {
        for id in ids {
            self.catalog.load(*id).await?;
        }
        self.storage.active.replace_active_courses(ids).await?;
        Ok(())
    }

    /// A progress store for bulk edits outside a study session.
    ///
    /// # Errors
    ///
    /// Returns `TrackerServicesError::Progress` if the stored record cannot be read.
    pub async fn progress_store(
        &self,
        course: Arc<Course>,
    ) -> Result<ProgressStore, TrackerServicesError> {
        let completions = Arc::clone(&self.storage.completions);
        Ok(ProgressStore::try_load(course, completions, self.clock).await?)
    }

    /// Open a study session with the current settings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the textbook does not exist. Settings that
    /// cannot be loaded are reported and replaced by defaults.
    pub async fn open_session(
        &self,
        course: Arc<Course>,
        textbook_index: usize,
        viewer: Option<Box<dyn ViewerSyncAdapter>>,
    ) -> Result<StudySession, SessionError> {
        let settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(err) => {
                self.reporter
                    .report(ErrorNotice::new("Failed to load settings", &err));
                Settings::default()
            }
        };
        let ctx = SessionContext {
            completions: Arc::clone(&self.storage.completions),
            reporter: Arc::clone(&self.reporter),
            settings,
            clock: self.clock,
        };
        StudySession::open(&ctx, course, textbook_index, viewer).await
    }
}
