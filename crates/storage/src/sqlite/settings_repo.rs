use async_trait::async_trait;
use tracker_core::model::Settings;

use super::{
    SqliteRepository,
    mapping::{conn, map_settings_row},
};
use crate::repository::{SettingsRepository, StorageError};

#[async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(&self) -> Result<Option<Settings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                show_course_clock,
                maximum_course_time,
                maximum_daily_time,
                maximum_daily_chapters,
                weeks_displayed,
                tick_interval_secs
            FROM app_settings
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_settings_row).transpose()
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        sqlx::query(
            r"
            INSERT INTO app_settings (
                id,
                show_course_clock,
                maximum_course_time,
                maximum_daily_time,
                maximum_daily_chapters,
                weeks_displayed,
                tick_interval_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                show_course_clock = excluded.show_course_clock,
                maximum_course_time = excluded.maximum_course_time,
                maximum_daily_time = excluded.maximum_daily_time,
                maximum_daily_chapters = excluded.maximum_daily_chapters,
                weeks_displayed = excluded.weeks_displayed,
                tick_interval_secs = excluded.tick_interval_secs
            ",
        )
        .bind(1_i64)
        .bind(settings.show_course_clock())
        .bind(i64::from(settings.maximum_course_time()))
        .bind(i64::from(settings.maximum_daily_time()))
        .bind(f64::from(settings.maximum_daily_chapters()))
        .bind(i64::from(settings.weeks_displayed()))
        .bind(i64::from(settings.tick_interval_secs()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
