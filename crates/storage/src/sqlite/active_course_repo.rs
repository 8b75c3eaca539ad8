use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::Row;
use tracker_core::model::CourseId;

use super::{
    SqliteRepository,
    mapping::{conn, course_id_from_key, ser},
};
use crate::repository::{ActiveCourseRepository, StorageError};

#[async_trait]
impl ActiveCourseRepository for SqliteRepository {
    async fn active_courses(&self) -> Result<BTreeSet<CourseId>, StorageError> {
        let rows = sqlx::query("SELECT course_id FROM active_courses")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let key: String = row.try_get("course_id").map_err(ser)?;
                course_id_from_key(&key)
            })
            .collect()
    }

    async fn set_course_active(&self, id: CourseId, active: bool) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        let query = if active {
            "INSERT INTO active_courses (course_id) VALUES (?1) ON CONFLICT(course_id) DO NOTHING"
        } else {
            "DELETE FROM active_courses WHERE course_id = ?1"
        };
        sqlx::query(query)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn replace_active_courses(&self, ids: &BTreeSet<CourseId>) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM active_courses")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        for id in ids {
            sqlx::query("INSERT INTO active_courses (course_id) VALUES (?1)")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
