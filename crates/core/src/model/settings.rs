use std::time::Duration;

use thiserror::Error;

use crate::calendar::HeatmapScale;

const TIME_LEVELS: u8 = 5;
const CHAPTER_LEVELS: u8 = 3;

/// User-facing tracker settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    show_course_clock: bool,
    maximum_course_time: u16,
    maximum_daily_time: u16,
    maximum_daily_chapters: f32,
    weeks_displayed: u8,
    tick_interval_secs: u16,
}

#[derive(Clone, Debug, Default)]
pub struct SettingsDraft {
    pub show_course_clock: Option<bool>,
    pub maximum_course_time: Option<u16>,
    pub maximum_daily_time: Option<u16>,
    pub maximum_daily_chapters: Option<f32>,
    pub weeks_displayed: Option<u8>,
    pub tick_interval_secs: Option<u16>,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("maximum course time must be > 0 minutes")]
    InvalidMaximumCourseTime,

    #[error("maximum daily time must be > 0 minutes")]
    InvalidMaximumDailyTime,

    #[error("maximum daily chapters must be a positive number, got {0}")]
    InvalidMaximumDailyChapters(f32),

    #[error("weeks displayed must be > 0")]
    InvalidWeeksDisplayed,

    #[error("tick interval must be > 0 seconds")]
    InvalidTickInterval,
}

impl SettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft, filling unset fields from the defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any maximum, the week count, or the tick interval is out of range.
    pub fn validate(self) -> Result<Settings, SettingsError> {
        let defaults = Settings::default();
        let settings = Settings {
            show_course_clock: self.show_course_clock.unwrap_or(defaults.show_course_clock),
            maximum_course_time: self
                .maximum_course_time
                .unwrap_or(defaults.maximum_course_time),
            maximum_daily_time: self
                .maximum_daily_time
                .unwrap_or(defaults.maximum_daily_time),
            maximum_daily_chapters: self
                .maximum_daily_chapters
                .unwrap_or(defaults.maximum_daily_chapters),
            weeks_displayed: self.weeks_displayed.unwrap_or(defaults.weeks_displayed),
            tick_interval_secs: self
                .tick_interval_secs
                .unwrap_or(defaults.tick_interval_secs),
        };

        if settings.maximum_course_time == 0 {
            return Err(SettingsError::InvalidMaximumCourseTime);
        }
        if settings.maximum_daily_time == 0 {
            return Err(SettingsError::InvalidMaximumDailyTime);
        }
        if !settings.maximum_daily_chapters.is_finite() || settings.maximum_daily_chapters <= 0.0 {
            return Err(SettingsError::InvalidMaximumDailyChapters(
                settings.maximum_daily_chapters,
            ));
        }
        if settings.weeks_displayed == 0 {
            return Err(SettingsError::InvalidWeeksDisplayed);
        }
        if settings.tick_interval_secs == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }

        Ok(settings)
    }
}

impl Settings {
    /// Rehydrate settings from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the stored values fail validation.
    pub fn from_persisted(draft: SettingsDraft) -> Result<Self, SettingsError> {
        draft.validate()
    }

    /// A fully populated draft, for editing.
    #[must_use]
    pub fn to_draft(&self) -> SettingsDraft {
        SettingsDraft {
            show_course_clock: Some(self.show_course_clock),
            maximum_course_time: Some(self.maximum_course_time),
            maximum_daily_time: Some(self.maximum_daily_time),
            maximum_daily_chapters: Some(self.maximum_daily_chapters),
            weeks_displayed: Some(self.weeks_displayed),
            tick_interval_secs: Some(self.tick_interval_secs),
        }
    }

    #[must_use]
    pub fn show_course_clock(&self) -> bool {
        self.show_course_clock
    }

    /// Per-course daily target, in minutes.
    #[must_use]
    pub fn maximum_course_time(&self) -> u16 {
        self.maximum_course_time
    }

    /// Cross-course daily target, in minutes.
    #[must_use]
    pub fn maximum_daily_time(&self) -> u16 {
        self.maximum_daily_time
    }

    #[must_use]
    pub fn maximum_daily_chapters(&self) -> f32 {
        self.maximum_daily_chapters
    }

    #[must_use]
    pub fn weeks_displayed(&self) -> u8 {
        self.weeks_displayed
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.tick_interval_secs))
    }

    #[must_use]
    pub fn tick_interval_secs(&self) -> u16 {
        self.tick_interval_secs
    }

    /// Heatmap scale for seconds studied per day.
    #[must_use]
    pub fn time_scale(&self) -> HeatmapScale {
        HeatmapScale::new(0.0, f64::from(self.maximum_daily_time) * 60.0, TIME_LEVELS)
    }

    /// Heatmap scale for chapters completed per day.
    #[must_use]
    pub fn chapter_scale(&self) -> HeatmapScale {
        HeatmapScale::new(0.0, f64::from(self.maximum_daily_chapters), CHAPTER_LEVELS)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_course_clock: true,
            maximum_course_time: 150,
            maximum_daily_time: 300,
            maximum_daily_chapters: 1.5,
            weeks_displayed: 24,
            tick_interval_secs: 1,
        }
    }
}
