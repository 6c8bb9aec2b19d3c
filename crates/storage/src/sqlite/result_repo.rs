use drill_core::model::ResultRecord;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u8_from_i64, u32_from_i64};
use crate::repository::{ResultQueueRepository, StorageError};

fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ResultRecord, StorageError> {
    Ok(ResultRecord {
        id: row.try_get("session_id").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        base_score: u32_from_i64(
            "base_score",
            row.try_get::<i64, _>("base_score").map_err(ser)?,
        )?,
        time_bonus: u32_from_i64(
            "time_bonus",
            row.try_get::<i64, _>("time_bonus").map_err(ser)?,
        )?,
        total_time: row.try_get("total_time_ms").map_err(ser)?,
        time_in_minutes: row.try_get("time_in_minutes").map_err(ser)?,
        questions_answered: u32_from_i64(
            "questions_answered",
            row.try_get::<i64, _>("questions_answered").map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        progress_percent: u8_from_i64(
            "progress_percent",
            row.try_get::<i64, _>("progress_percent").map_err(ser)?,
        )?,
    })
}

#[async_trait::async_trait]
impl ResultQueueRepository for SqliteRepository {
    async fn upsert_result(&self, record: &ResultRecord) -> Result<(), StorageError> {
        // queued_at is preserved on conflict so the queue keeps its
        // first-enqueued ordering across repeated pushes.
        sqlx::query(
            r"
                INSERT INTO result_queue (
                    session_id, name, score, base_score, time_bonus,
                    total_time_ms, time_in_minutes, questions_answered,
                    correct_answers, progress_percent, queued_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT (session_id, name) DO UPDATE SET
                    score = excluded.score,
                    base_score = excluded.base_score,
                    time_bonus = excluded.time_bonus,
                    total_time_ms = excluded.total_time_ms,
                    time_in_minutes = excluded.time_in_minutes,
                    questions_answered = excluded.questions_answered,
                    correct_answers = excluded.correct_answers,
                    progress_percent = excluded.progress_percent
            ",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(i64::from(record.score))
        .bind(i64::from(record.base_score))
        .bind(i64::from(record.time_bonus))
        .bind(record.total_time)
        .bind(record.time_in_minutes)
        .bind(i64::from(record.questions_answered))
        .bind(i64::from(record.correct_answers))
        .bind(i64::from(record.progress_percent))
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    session_id, name, score, base_score, time_bonus,
                    total_time_ms, time_in_minutes, questions_answered,
                    correct_answers, progress_percent
                FROM result_queue
                ORDER BY queued_at ASC, session_id ASC, name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }

    async fn remove_result(&self, session_id: &str, name: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM result_queue WHERE session_id = ?1 AND name = ?2")
            .bind(session_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
