//! A study session: one textbook of one course open in a viewer.

use std::sync::Arc;

use storage::repository::{CompletionRepository, SaveOutcome};
use tokio::sync::{mpsc, watch};
use tracker_core::model::{Course, CourseProgress, Settings};
use tracker_core::{Clock, CompletionModel};

use crate::accumulator::TimeAccumulator;
use crate::error::SessionError;
use crate::notice::{ErrorNotice, ErrorReporter};
use crate::progress_store::ProgressStore;
use crate::viewer::{LocationChanged, NavigationItem, ViewerSyncAdapter};

/// Collaborators shared by every session a host opens.
#[derive(Clone)]
pub struct SessionContext {
    pub completions: Arc<dyn CompletionRepository>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub settings: Settings,
    pub clock: Clock,
}

pub struct StudySession {
    textbook_index: usize,
    model: CompletionModel,
    store: ProgressStore,
    reporter: Arc<dyn ErrorReporter>,
    viewer: Option<Box<dyn ViewerSyncAdapter>>,
    navigation: Vec<NavigationItem>,
    locations: Option<mpsc::Receiver<LocationChanged>>,
    visibility: watch::Sender<bool>,
    timer: TimeAccumulator,
}

impl StudySession {
    /// Open a textbook for study.
    ///
    /// Load and viewer failures are reported and the session continues: a
    /// failed load starts from an empty record, a failed viewer leaves the
    /// session without navigation. The stored position is restored once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownTextbook` if the course has no textbook
    /// at `textbook_index`.
    pub async fn open(
        ctx: &SessionContext,
        course: Arc<Course>,
        textbook_index: usize,
        viewer: Option<Box<dyn ViewerSyncAdapter>>,
    ) -> Result<Self, SessionError> {
        let Some(textbook) = course.textbook(textbook_index) else {
            return Err(SessionError::UnknownTextbook(textbook_index));
        };

        let store = ProgressStore::load(
            Arc::clone(&course),
            Arc::clone(&ctx.completions),
            ctx.clock,
            ctx.reporter.as_ref(),
        )
        .await;
        let model = CompletionModel::new(textbook, store.completed_sections(textbook_index));

        let mut navigation = Vec::new();
        let mut locations = None;
        let viewer = match viewer {
            Some(mut viewer) => match viewer.open(&course, textbook_index).await {
                Ok(items) => {
                    navigation = items;
                    locations = viewer.location_events();
                    if let Some(position) = store.position(textbook_index) {
                        if let Err(err) = viewer.restore_position(&position).await {
                            log::warn!("failed to restore position in {}: {err}", textbook.label);
                            ctx.reporter.report(ErrorNotice::new(
                                "Failed to restore reading position",
                                &err,
                            ));
                        }
                    }
                    Some(viewer)
                }
                Err(err) => {
                    log::warn!("viewer failed to open {}: {err}", textbook.label);
                    ctx.reporter.report(ErrorNotice::new(
                        format!("Failed to open {}", textbook.label),
                        &err,
                    ));
                    viewer.teardown().await;
                    None
                }
            },
            None => None,
        };

        let (visibility, visible_rx) = watch::channel(true);
        let timer = TimeAccumulator::start(
            store.clone(),
            ctx.settings.tick_interval(),
            visible_rx,
            Arc::clone(&ctx.reporter),
        );

        log::info!(
            "opened course {} textbook {textbook_index} ({})",
            course.id,
            textbook.label
        );

        Ok(Self {
            textbook_index,
            model,
            store,
            reporter: Arc::clone(&ctx.reporter),
            viewer,
            navigation,
            locations,
            visibility,
            timer,
        })
    }

    #[must_use]
    pub fn textbook_index(&self) -> usize {
        self.textbook_index
    }

    #[must_use]
    pub fn model(&self) -> &CompletionModel {
        &self.model
    }

    #[must_use]
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    #[must_use]
    pub fn navigation(&self) -> &[NavigationItem] {
        &self.navigation
    }

    #[must_use]
    pub fn has_viewer(&self) -> bool {
        self.viewer.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        self.store.progress()
    }

    /// Where the listing should expand or scroll to.
    #[must_use]
    pub fn next_actionable_item(&self) -> Option<&str> {
        self.model.next_actionable_item()
    }

    /// Check or uncheck an identifier and persist the edit immediately.
    ///
    /// Unknown identifiers are ignored. A failed flush is reported; the edit
    /// stays in memory and is written by the next timer flush. Returns whether
    /// the owning chapter's completion changed.
    pub async fn toggle(&mut self, identifier: &str, checked: bool) -> bool {
        if self.model.chapter_of(identifier).is_none() {
            log::debug!("ignoring toggle of unknown section {identifier}");
            return false;
        }

        self.refresh_model();
        let chapter_changed = self.model.toggle(identifier, checked);
        let completed = self.model.completed_sections().clone();
        match self
            .store
            .apply_completion_edit(self.textbook_index, completed)
            .await
        {
            Ok(SaveOutcome::Applied) => log::debug!("saved toggle of {identifier}"),
            Ok(SaveOutcome::Superseded { stored_revision }) => log::debug!(
                "toggle of {identifier} superseded by stored revision {stored_revision}, a newer snapshot carries it"
            ),
            Err(err) => {
                log::warn!("failed to save completion edit: {err}");
                self.reporter
                    .report(ErrorNotice::new("Failed to save progress", &err));
            }
        }
        self.refresh_model();
        chapter_changed
    }

    /// Rebuild the model when the store's record moved underneath it, which
    /// happens once a store that started from a failed load reads the
    /// stored record.
    fn refresh_model(&mut self) {
        let stored = self.store.completed_sections(self.textbook_index);
        if &stored == self.model.completed_sections() {
            return;
        }
        let course = Arc::clone(self.store.course());
        if let Some(textbook) = course.textbook(self.textbook_index) {
            self.model = CompletionModel::new(textbook, stored);
        }
    }

    /// Record a viewer location. Returns the index of the chapter owning the
    /// reported identifier, for highlighting.
    pub fn on_location_changed(&mut self, event: LocationChanged) -> Option<usize> {
        if let Err(err) = self
            .store
            .record_position(self.textbook_index, event.position)
        {
            log::warn!("failed to record position: {err}");
        }
        event
            .identifier
            .as_deref()
            .and_then(|identifier| self.model.chapter_of(identifier))
    }

    /// Wait for the next location event from the viewer.
    ///
    /// Returns `None` when there is no viewer or it stopped emitting.
    pub async fn next_location(&mut self) -> Option<LocationChanged> {
        match self.locations.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Report whether the session is visible to the user. Hiding flushes.
    pub fn set_visible(&self, visible: bool) {
        self.visibility.send_replace(visible);
    }

    /// Stop the timer, tear the viewer down, and wait for the final flush.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Progress` if the final flush fails. The failure
    /// is also reported.
    pub async fn close(mut self) -> Result<SaveOutcome, SessionError> {
        self.locations = None;
        if let Some(mut viewer) = self.viewer.take() {
            viewer.teardown().await;
        }

        let course_id = self.store.course().id;
        match self.timer.stop().await {
            Ok(outcome) => {
                log::info!("closed session for course {course_id}");
                Ok(outcome)
            }
            Err(err) => {
                self.reporter
                    .report(ErrorNotice::new("Failed to save progress", &err));
                Err(err.into())
            }
        }
    }
}
