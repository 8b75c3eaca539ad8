//! Single source of truth for one course's completion record.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use storage::repository::{CompletionRepository, SaveOutcome, StoredCompletion};
use tracker_core::Clock;
use tracker_core::model::{Course, CourseCompletionData, CourseProgress};

use crate::error::ProgressError;
use crate::notice::{ErrorNotice, ErrorReporter};

struct StoreState {
    clock: Clock,
    data: CourseCompletionData,
    /// Revision handed to the most recent flush snapshot.
    revision: u64,
    /// Last record known to be stored, and its revision. Local edits are the
    /// difference between `data` and `base`.
    base: StoredCompletion,
    /// False until the stored record has actually been read.
    synced: bool,
    last_accrual: Option<NaiveDate>,
}

impl StoreState {
    fn new(clock: Clock, stored: StoredCompletion, synced: bool) -> Self {
        Self {
            clock,
            data: stored.data.clone(),
            revision: stored.revision,
            base: stored,
            synced,
            last_accrual: None,
        }
    }
}

/// In-memory owner of a `CourseCompletionData` record, flushed in full
/// snapshots through a `CompletionRepository`.
///
/// Cloning shares the same record, so a session and its timer see one store.
#[derive(Clone)]
pub struct ProgressStore {
    course: Arc<Course>,
    repo: Arc<dyn CompletionRepository>,
    state: Arc<Mutex<StoreState>>,
}

impl ProgressStore {
    /// Load the stored record for `course`.
    ///
    /// A load failure is reported and the store starts from an empty record,
    /// so the course shows as not started instead of blocking the session.
    /// Such a store reads the stored record again before its first write and
    /// replays its own edits on top, so it never overwrites history it has
    /// not seen.
    pub async fn load(
        course: Arc<Course>,
        repo: Arc<dyn CompletionRepository>,
        clock: Clock,
        reporter: &dyn ErrorReporter,
    ) -> Self {
        let state = match repo.load_completion(course.id).await {
            Ok(stored) => StoreState::new(clock, stored.unwrap_or_default(), true),
            Err(err) => {
                log::warn!("falling back to empty progress for course {}", course.id);
                reporter.report(ErrorNotice::new(
                    format!("Failed to load progress for {}", course.title),
                    &err,
                ));
                StoreState::new(clock, StoredCompletion::default(), false)
            }
        };

        Self {
            course,
            repo,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Load the stored record, propagating a failure instead of falling back.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the record cannot be read.
    pub async fn try_load(
        course: Arc<Course>,
        repo: Arc<dyn CompletionRepository>,
        clock: Clock,
    ) -> Result<Self, ProgressError> {
        let stored = repo.load_completion(course.id).await?.unwrap_or_default();
        Ok(Self {
            course,
            repo,
            state: Arc::new(Mutex::new(StoreState::new(clock, stored, true))),
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_textbook(&self, textbook_index: usize) -> Result<(), ProgressError> {
        if textbook_index < self.course.books.len() {
            Ok(())
        } else {
            Err(ProgressError::UnknownTextbook(textbook_index))
        }
    }

    #[must_use]
    pub fn course(&self) -> &Arc<Course> {
        &self.course
    }

    /// Copy of the current in-memory record.
    #[must_use]
    pub fn snapshot(&self) -> CourseCompletionData {
        self.state().data.clone()
    }

    #[must_use]
    pub fn completed_sections(&self, textbook_index: usize) -> BTreeSet<String> {
        self.state()
            .data
            .book(textbook_index)
            .map(|book| book.completed_sections.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn position(&self, textbook_index: usize) -> Option<String> {
        self.state()
            .data
            .book(textbook_index)
            .and_then(|book| book.position.clone())
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state().revision
    }

    /// Whether the stored record has been read since the store was created.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.state().synced
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.state().clock
    }

    pub fn set_clock(&self, clock: Clock) {
        self.state().clock = clock;
    }

    /// Seconds recorded for the clock's current date.
    #[must_use]
    pub fn time_today(&self) -> u64 {
        let state = self.state();
        state.data.time_on(state.clock.today())
    }

    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        let state = self.state();
        CourseProgress::calculate(&self.course, &state.data, state.clock.today())
    }

    /// Replace a textbook's completed set and flush immediately.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownTextbook` for an index outside the
    /// course, or `ProgressError::Storage` if the flush fails. The edit stays
    /// in memory either way and is retried by the next flush.
    pub async fn apply_completion_edit(
        &self,
        textbook_index: usize,
        completed_sections: BTreeSet<String>,
    ) -> Result<SaveOutcome, ProgressError> {
        self.check_textbook(textbook_index)?;
        self.state().data.book_mut(textbook_index).completed_sections = completed_sections;
        self.flush().await
    }

    /// Remember the viewer position for a textbook. Written by the next flush.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownTextbook` for an index outside the course.
    pub fn record_position(
        &self,
        textbook_index: usize,
        position: impl Into<String>,
    ) -> Result<(), ProgressError> {
        self.check_textbook(textbook_index)?;
        self.state().data.book_mut(textbook_index).position = Some(position.into());
        Ok(())
    }

    /// Add study time to the bucket for the clock's current date.
    ///
    /// Returns the new total for that date.
    pub fn accumulate_time(&self, seconds: u64) -> u64 {
        let mut state = self.state();
        let today = state.clock.today();
        match state.last_accrual.replace(today) {
            Some(previous) if previous != today => log::info!(
                "study date rolled over from {previous} to {today} for course {}",
                self.course.id
            ),
            _ => {}
        }
        state.data.add_time(today, seconds)
    }

    /// Mark every root and leaf of every textbook complete, keeping study
    /// time and viewer positions, and flush immediately.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the flush fails.
    pub async fn mark_course_complete(&self) -> Result<SaveOutcome, ProgressError> {
        {
            let mut state = self.state();
            let completed = CourseCompletionData::completed(&self.course);
            for (index, book) in completed.books {
                state.data.book_mut(index).completed_sections = book.completed_sections;
            }
        }
        self.flush().await
    }

    /// Reset the record to empty, study time included, and flush immediately.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the flush fails.
    pub async fn clear_course_progress(&self) -> Result<SaveOutcome, ProgressError> {
        self.state().data = CourseCompletionData::default();
        self.flush().await
    }

    /// Write the full current record as a new snapshot revision.
    ///
    /// Safe to call redundantly. A snapshot that completes after a newer one
    /// from this store has already been stored is discarded by the repository
    /// and reported as `SaveOutcome::Superseded`.
    ///
    /// If the store has never read the stored record, or the newest snapshot
    /// loses to a stored revision this store did not write, the stored record
    /// is read and the local edits are replayed onto it before writing again.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the repository rejects the read or
    /// the write, and `ProgressError::Superseded` if the merged snapshot still
    /// loses to a newer stored revision.
    pub async fn flush(&self) -> Result<SaveOutcome, ProgressError> {
        let synced = self.state().synced;
        if !synced {
            self.rebase_on_stored().await?;
        }

        let (data, revision, today) = self.next_snapshot();
        match self.save(&data, revision, today).await? {
            SaveOutcome::Superseded { stored_revision } if self.is_newest(revision) => {
                log::warn!(
                    "course {} has stored revision {stored_revision} this store never saw, merging",
                    self.course.id
                );
                self.rebase_on_stored().await?;
                let (data, revision, today) = self.next_snapshot();
                match self.save(&data, revision, today).await? {
                    SaveOutcome::Superseded { stored_revision } => Err(ProgressError::Superseded {
                        revision,
                        stored_revision,
                    }),
                    applied => Ok(applied),
                }
            }
            outcome => Ok(outcome),
        }
    }

    fn next_snapshot(&self) -> (CourseCompletionData, u64, NaiveDate) {
        let mut state = self.state();
        state.revision += 1;
        (state.data.clone(), state.revision, state.clock.today())
    }

    fn is_newest(&self, revision: u64) -> bool {
        self.state().revision == revision
    }

    async fn save(
        &self,
        data: &CourseCompletionData,
        revision: u64,
        today: NaiveDate,
    ) -> Result<SaveOutcome, ProgressError> {
        let outcome = self
            .repo
            .save_completion(&self.course, data, revision, today)
            .await?;
        match outcome {
            SaveOutcome::Applied => {
                let mut state = self.state();
                if revision > state.base.revision {
                    state.base = StoredCompletion {
                        data: data.clone(),
                        revision,
                    };
                }
            }
            SaveOutcome::Superseded { stored_revision } => log::debug!(
                "flush of revision {revision} for course {} superseded by stored revision {stored_revision}",
                self.course.id
            ),
        }
        Ok(outcome)
    }

    /// Read the stored record and make it the new base, keeping local edits.
    async fn rebase_on_stored(&self) -> Result<(), ProgressError> {
        let stored = self
            .repo
            .load_completion(self.course.id)
            .await?
            .unwrap_or_default();

        let mut state = self.state();
        let merged = state.data.rebase(&state.base.data, &stored.data);
        state.data = merged;
        state.revision = state.revision.max(stored.revision);
        log::info!(
            "rebased course {} onto stored revision {}",
            self.course.id,
            stored.revision
        );
        state.base = stored;
        state.synced = true;
        Ok(())
    }

    /// Flush, reporting a failure instead of returning it.
    pub async fn flush_or_report(&self, reporter: &dyn ErrorReporter) -> Option<SaveOutcome> {
        match self.flush().await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                log::warn!("flush failed for course {}: {err}", self.course.id);
                reporter.report(ErrorNotice::new("Failed to save progress", &err));
                None
            }
        }
    }
}
