mod activity;
pub(crate) mod course;
mod ids;
mod progress;
mod record;
mod settings;

pub use activity::{ActivityDelta, ActivityHistory};
pub use course::{Chapter, Course, SectionGroup, Textbook};
pub use ids::{CourseId, ParseIdError};
pub use progress::{CourseProgress, CourseStatus, TextbookProgress};
pub use record::{CourseCompletionData, TextbookCompletion};
pub use settings::{Settings, SettingsDraft, SettingsError};
