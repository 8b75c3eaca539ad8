//! Command-line arguments for the tracker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracker_core::model::{CourseId, SettingsDraft};

#[derive(Parser, Debug)]
#[command(
    name = "tracker",
    about = "Track reading progress and study time across courses",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// SQLite database URL or path
    #[arg(long = "db", env = "TRACKER_DB_URL", default_value = "sqlite://tracker.sqlite3")]
    pub db_url: String,

    /// Directory holding `<uuid>.toml` course files
    #[arg(long, env = "TRACKER_COURSES_DIR", default_value = "courses")]
    pub courses: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum Metric {
    /// Seconds studied per day
    Time,
    /// Chapters completed per day
    Chapters,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List active courses with their progress, sorted by title.
    Status {
        /// List every course in the courses directory instead
        #[arg(long)]
        all: bool,
    },
    /// Add courses to the overview.
    Activate {
        #[arg(value_name = "COURSE", required = true)]
        courses: Vec<CourseId>,
        /// Make these the only active courses
        #[arg(long)]
        only: bool,
    },
    /// Remove a course from the overview. Its progress is kept.
    Deactivate {
        #[arg(value_name = "COURSE")]
        course: CourseId,
    },
    /// Show the daily activity heatmap.
    History {
        #[arg(long, value_enum, default_value = "time")]
        metric: Metric,
    },
    /// Check or uncheck a chapter or section.
    Toggle {
        #[arg(value_name = "COURSE")]
        course: CourseId,
        #[arg(value_name = "SECTION")]
        identifier: String,
        /// Textbook index within the course
        #[arg(long, default_value_t = 0)]
        book: usize,
        /// Uncheck instead of check
        #[arg(long)]
        uncheck: bool,
    },
    /// Mark every chapter of a course complete.
    Complete {
        #[arg(value_name = "COURSE")]
        course: CourseId,
    },
    /// Erase all progress and study time for a course.
    Clear {
        #[arg(value_name = "COURSE")]
        course: CourseId,
    },
    /// Run the study timer for a textbook until the time is up or Ctrl-C.
    Study {
        #[arg(value_name = "COURSE")]
        course: CourseId,
        #[arg(long, default_value_t = 0)]
        book: usize,
        /// Stop after this many minutes
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Show or change settings.
    Settings(SettingsArgs),
}

/// Settings to change; omitted flags keep their current value.
#[derive(Debug, clap::Args)]
pub struct SettingsArgs {
    #[arg(long)]
    pub show_course_clock: Option<bool>,
    /// Daily target per course, in minutes
    #[arg(long)]
    pub maximum_course_time: Option<u16>,
    /// Daily target across courses, in minutes
    #[arg(long)]
    pub maximum_daily_time: Option<u16>,
    #[arg(long)]
    pub maximum_daily_chapters: Option<f32>,
    #[arg(long)]
    pub weeks_displayed: Option<u8>,
    #[arg(long)]
    pub tick_interval_secs: Option<u16>,
}

impl SettingsArgs {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.show_course_clock.is_none()
            && self.maximum_course_time.is_none()
            && self.maximum_daily_time.is_none()
            && self.maximum_daily_chapters.is_none()
            && self.weeks_displayed.is_none()
            && self.tick_interval_secs.is_none()
    }

    #[must_use]
    pub fn to_draft(&self) -> SettingsDraft {
        SettingsDraft {
            show_course_clock: self.show_course_clock,
            maximum_course_time: self.maximum_course_time,
            maximum_daily_time: self.maximum_daily_time,
            maximum_daily_chapters: self.maximum_daily_chapters,
            weeks_displayed: self.weeks_displayed,
            tick_interval_secs: self.tick_interval_secs,
        }
    }
}
