//! Read-only summaries for listings and history heatmaps.

use std::sync::Arc;

use storage::repository::{ActivityRepository, CompletionRepository, SettingsRepository};
use tracker_core::Clock;
use tracker_core::calendar::{self, CalendarSeries, HeatmapScale, MeterCell};
use tracker_core::model::{ActivityHistory, Course, CourseProgress, CourseStatus, Settings};

use crate::error::OverviewError;

/// One heatmap: the dense series plus the level of every cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub series: CalendarSeries,
    /// `None` for cells without data.
    pub levels: Vec<Option<u8>>,
    pub scale: HeatmapScale,
}

impl Heatmap {
    #[must_use]
    pub fn build<I>(values: I, weeks: u8, today: chrono::NaiveDate, scale: HeatmapScale) -> Self
    where
        I: IntoIterator<Item = (chrono::NaiveDate, f64)>,
    {
        let series = calendar::aggregate(values, u32::from(weeks), today);
        let levels = series.cells.iter().map(|cell| scale.level(*cell)).collect();
        Self {
            series,
            levels,
            scale,
        }
    }
}

/// Study time and chapter completion heatmaps across every course.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOverview {
    pub time: Heatmap,
    pub chapters: Heatmap,
}

impl ProgressOverview {
    #[must_use]
    pub fn from_history(
        history: &ActivityHistory,
        settings: &Settings,
        today: chrono::NaiveDate,
    ) -> Self {
        let weeks = settings.weeks_displayed();
        #[allow(clippy::cast_precision_loss)]
        let time = Heatmap::build(
            history
                .time_spent
                .iter()
                .map(|(date, seconds)| (*date, *seconds as f64)),
            weeks,
            today,
            settings.time_scale(),
        );
        let chapters = Heatmap::build(
            history
                .chapters_completed
                .iter()
                .map(|(date, chapters)| (*date, *chapters)),
            weeks,
            today,
            settings.chapter_scale(),
        );
        Self { time, chapters }
    }
}

/// A course as shown in a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSummary {
    pub course: Arc<Course>,
    pub progress: CourseProgress,
    pub status: CourseStatus,
    /// Today's study clock against `maximum_course_time`, when enabled.
    pub clock: Option<Vec<MeterCell>>,
}

/// Cells in the per-course study clock meter.
pub const COURSE_CLOCK_CELLS: usize = 10;

#[derive(Clone)]
pub struct OverviewService {
    clock: Clock,
    completions: Arc<dyn CompletionRepository>,
    activity: Arc<dyn ActivityRepository>,
    settings: Arc<dyn SettingsRepository>,
}

impl OverviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        completions: Arc<dyn CompletionRepository>,
        activity: Arc<dyn ActivityRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            clock,
            completions,
            activity,
            settings,
        }
    }

    async fn current_settings(&self) -> Result<Settings, OverviewError> {
        Ok(self.settings.get_settings().await?.unwrap_or_default())
    }

    /// Heatmaps for the trailing `weeks_displayed` weeks.
    ///
    /// # Errors
    ///
    /// Returns `OverviewError` on storage failures.
    pub async fn overview(&self) -> Result<ProgressOverview, OverviewError> {
        let settings = self.current_settings().await?;
        let history = self.activity.activity_history().await?;
        Ok(ProgressOverview::from_history(
            &history,
            &settings,
            self.clock.today(),
        ))
    }

    /// Progress and listing category for each course, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `OverviewError` on storage failures.
    pub async fn course_summaries(
        &self,
        courses: &[Arc<Course>],
    ) -> Result<Vec<CourseSummary>, OverviewError> {
        let settings = self.current_settings().await?;
        let today = self.clock.today();

        let mut summaries = Vec::with_capacity(courses.len());
        for course in courses {
            let data = self
                .completions
                .load_completion(course.id)
                .await?
                .map(|stored| stored.data)
                .unwrap_or_default();
            let progress = CourseProgress::calculate(course, &data, today);
            let status = progress.status(course);
            #[allow(clippy::cast_precision_loss)]
            let clock = settings.show_course_clock().then(|| {
                calendar::meter(
                    progress.time_spent_today as f64,
                    0.0,
                    f64::from(settings.maximum_course_time()) * 60.0,
                    COURSE_CLOCK_CELLS,
                )
            });
            summaries.push(CourseSummary {
                course: Arc::clone(course),
                progress,
                status,
                clock,
            });
        }
        Ok(summaries)
    }
}
