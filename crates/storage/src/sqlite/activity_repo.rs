use async_trait::async_trait;
use sqlx::Row;
use tracker_core::model::ActivityHistory;

use super::{
    SqliteRepository,
    mapping::{conn, date_from_key, seconds_from_i64, ser},
};
use crate::repository::{ActivityRepository, StorageError};

#[async_trait]
impl ActivityRepository for SqliteRepository {
    async fn activity_history(&self) -> Result<ActivityHistory, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT date, seconds, chapters
                FROM daily_activity
                ORDER BY date ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut history = ActivityHistory::default();
        for row in rows {
            let key: String = row.try_get("date").map_err(ser)?;
            let date = date_from_key(&key)?;
            let seconds: Option<i64> = row.try_get("seconds").map_err(ser)?;
            let chapters: Option<f64> = row.try_get("chapters").map_err(ser)?;
            if let Some(seconds) = seconds {
                history.time_spent.insert(date, seconds_from_i64(seconds)?);
            }
            if let Some(chapters) = chapters {
                history.chapters_completed.insert(date, chapters);
            }
        }
        Ok(history)
    }
}
