use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Row, Sqlite, Transaction};
use tracker_core::model::{ActivityDelta, ActivityHistory, Course, CourseCompletionData, CourseId};

use super::{
    SqliteRepository,
    mapping::{
        conn, date_to_key, decode_completion, encode_completion, revision_from_i64,
        revision_to_i64, seconds_from_i64, seconds_to_i64, ser,
    },
};
use crate::repository::{CompletionRepository, SaveOutcome, StorageError, StoredCompletion};

#[async_trait]
impl CompletionRepository for SqliteRepository {
    async fn load_completion(&self, id: CourseId) -> Result<Option<StoredCompletion>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT revision, payload
                FROM course_progress
                WHERE course_id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let revision: i64 = row.try_get("revision").map_err(ser)?;
        let payload: String = row.try_get("payload").map_err(ser)?;
        Ok(Some(StoredCompletion {
            data: decode_completion(&payload)?,
            revision: revision_from_i64(revision)?,
        }))
    }

    async fn save_completion(
        &self,
        course: &Course,
        data: &CourseCompletionData,
        revision: u64,
        today: NaiveDate,
    ) -> Result<SaveOutcome, StorageError> {
        let payload = encode_completion(data)?;
        let revision_i64 = revision_to_i64(revision)?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query(
            r"
                SELECT revision, payload
                FROM course_progress
                WHERE course_id = ?1
            ",
        )
        .bind(course.id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?;

        let previous = match existing {
            Some(row) => {
                let stored: i64 = row.try_get("revision").map_err(ser)?;
                let stored = revision_from_i64(stored)?;
                if stored >= revision {
                    tx.rollback().await.map_err(conn)?;
                    return Ok(SaveOutcome::Superseded {
                        stored_revision: stored,
                    });
                }
                let payload: String = row.try_get("payload").map_err(ser)?;
                decode_completion(&payload)?
            }
            None => CourseCompletionData::default(),
        };

        let delta = ActivityDelta::between(course, &previous, data, today);
        if !delta.is_empty() {
            fold_activity(&mut tx, today, delta).await?;
        }

        sqlx::query(
            r"
                INSERT INTO course_progress (course_id, revision, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(course_id) DO UPDATE SET
                    revision = excluded.revision,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(course.id.to_string())
        .bind(revision_i64)
        .bind(payload)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(SaveOutcome::Applied)
    }
}

/// Apply `delta` to the stored activity for `date` inside the caller's transaction.
async fn fold_activity(
    tx: &mut Transaction<'_, Sqlite>,
    date: NaiveDate,
    delta: ActivityDelta,
) -> Result<(), StorageError> {
    let key = date_to_key(date);
    let row = sqlx::query("SELECT seconds, chapters FROM daily_activity WHERE date = ?1")
        .bind(&key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(conn)?;

    let mut day = ActivityHistory::default();
    if let Some(row) = row {
        let seconds: Option<i64> = row.try_get("seconds").map_err(ser)?;
        let chapters: Option<f64> = row.try_get("chapters").map_err(ser)?;
        if let Some(seconds) = seconds {
            day.time_spent.insert(date, seconds_from_i64(seconds)?);
        }
        if let Some(chapters) = chapters {
            day.chapters_completed.insert(date, chapters);
        }
    }

    day.apply(date, delta);

    let seconds = day.time_spent.get(&date).copied().map(seconds_to_i64).transpose()?;
    let chapters = day.chapters_completed.get(&date).copied();
    if seconds.is_none() && chapters.is_none() {
        return Ok(());
    }

    sqlx::query(
        r"
            INSERT INTO daily_activity (date, seconds, chapters)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(date) DO UPDATE SET
                seconds = excluded.seconds,
                chapters = excluded.chapters
        ",
    )
    .bind(key)
    .bind(seconds)
    .bind(chapters)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    Ok(())
}
