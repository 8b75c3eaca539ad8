#![forbid(unsafe_code)]

pub mod accumulator;
pub mod error;
pub mod notice;
pub mod overview;
pub mod progress_store;
pub mod session;
pub mod settings_service;
pub mod tracker_services;
pub mod viewer;

pub use tracker_core::Clock;

pub use accumulator::TimeAccumulator;
pub use error::{
    OverviewError, ProgressError, SessionError, SettingsServiceError, TrackerServicesError,
    ViewerError,
};
pub use notice::{ChannelReporter, ErrorNotice, ErrorReporter, LogReporter};
pub use overview::{CourseSummary, Heatmap, OverviewService, ProgressOverview};
pub use progress_store::ProgressStore;
pub use session::{SessionContext, StudySession};
pub use settings_service::SettingsService;
pub use tracker_services::TrackerServices;
pub use viewer::{LocationChanged, NavigationItem, ViewerSyncAdapter};
