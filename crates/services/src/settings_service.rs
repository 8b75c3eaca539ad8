use std::sync::Arc;

use storage::repository::SettingsRepository;
use tracker_core::model::{Settings, SettingsDraft};

use crate::error::SettingsServiceError;

#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn load(&self) -> Result<Settings, SettingsServiceError> {
        let settings = self.repo.get_settings().await?;
        Ok(settings.unwrap_or_default())
    }

    /// Apply the set fields of `changes` on top of the current settings,
    /// validate, and persist.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if validation fails or persistence fails.
    pub async fn update(&self, changes: SettingsDraft) -> Result<Settings, SettingsServiceError> {
        let current = self.load().await?.to_draft();
        let merged = SettingsDraft {
            show_course_clock: changes.show_course_clock.or(current.show_course_clock),
            maximum_course_time: changes.maximum_course_time.or(current.maximum_course_time),
            maximum_daily_time: changes.maximum_daily_time.or(current.maximum_daily_time),
            maximum_daily_chapters: changes
                .maximum_daily_chapters
                .or(current.maximum_daily_chapters),
            weeks_displayed: changes.weeks_displayed.or(current.weeks_displayed),
            tick_interval_secs: changes.tick_interval_secs.or(current.tick_interval_secs),
        };
        let settings = merged.validate()?;
        self.repo.save_settings(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use tracker_core::model::SettingsError;

    #[tokio::test]
    async fn update_merges_onto_stored_settings() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        assert_eq!(service.load().await.unwrap(), Settings::default());

        service
            .update(SettingsDraft {
                weeks_displayed: Some(12),
                ..SettingsDraft::default()
            })
            .await
            .unwrap();
        let settings = service
            .update(SettingsDraft {
                maximum_daily_time: Some(90),
                ..SettingsDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(settings.weeks_displayed(), 12);
        assert_eq!(settings.maximum_daily_time(), 90);
        assert_eq!(service.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn invalid_update_is_not_persisted() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        let err = service
            .update(SettingsDraft {
                weeks_displayed: Some(0),
                ..SettingsDraft::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettingsServiceError::Settings(SettingsError::InvalidWeeksDisplayed)
        ));
        assert_eq!(service.load().await.unwrap(), Settings::default());
    }
}
