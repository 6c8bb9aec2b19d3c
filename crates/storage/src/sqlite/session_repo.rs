use drill_core::model::SessionId;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64};
use crate::repository::{SessionRecord, SessionRepository, StorageError};

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    Ok(SessionRecord {
        participant_name: row.try_get("participant_name").map_err(ser)?,
        current_item_index: u32_from_i64(
            "current_item_index",
            row.try_get::<i64, _>("current_item_index").map_err(ser)?,
        )?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        total_time_ms: row.try_get("total_time_ms").map_err(ser)?,
        questions_answered: u32_from_i64(
            "questions_answered",
            row.try_get::<i64, _>("questions_answered").map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        game_start_time: row.try_get("game_start_time").map_err(ser)?,
        last_activity_time: row.try_get("last_activity_time").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn save_session(
        &self,
        id: &SessionId,
        record: &SessionRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO sessions (
                    session_id, participant_name, current_item_index, score,
                    total_time_ms, questions_answered, correct_answers,
                    game_start_time, last_activity_time
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (session_id) DO UPDATE SET
                    participant_name = excluded.participant_name,
                    current_item_index = excluded.current_item_index,
                    score = excluded.score,
                    total_time_ms = excluded.total_time_ms,
                    questions_answered = excluded.questions_answered,
                    correct_answers = excluded.correct_answers,
                    game_start_time = excluded.game_start_time,
                    last_activity_time = excluded.last_activity_time
            ",
        )
        .bind(id.as_str())
        .bind(&record.participant_name)
        .bind(i64::from(record.current_item_index))
        .bind(i64::from(record.score))
        .bind(record.total_time_ms)
        .bind(i64::from(record.questions_answered))
        .bind(i64::from(record.correct_answers))
        .bind(record.game_start_time)
        .bind(record.last_activity_time)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    participant_name, current_item_index, score, total_time_ms,
                    questions_answered, correct_answers, game_start_time,
                    last_activity_time
                FROM sessions
                WHERE session_id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }
}
