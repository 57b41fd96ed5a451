use sqlx::{Row, SqliteConnection};
use tutor_core::model::{AttemptRecord, LearnerId, LearnerStats};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_attempt_row, ser, write_err},
};
use crate::repository::{AttemptLogRepository, StorageError};

pub(super) async fn insert_attempt(
    db: &mut SqliteConnection,
    attempt: &AttemptRecord,
) -> Result<i64, StorageError> {
    let res = sqlx::query(
        r"
            INSERT INTO attempts (
                learner_id, topic_id, bloom_level, question,
                chosen_option, correct_option, is_correct, answered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
    )
    .bind(id_i64("learner_id", attempt.learner_id.value())?)
    .bind(id_i64("topic_id", attempt.topic_id.value())?)
    .bind(i64::from(attempt.bloom_level.value()))
    .bind(&attempt.question)
    .bind(&attempt.chosen_option)
    .bind(&attempt.correct_option)
    .bind(attempt.is_correct)
    .bind(attempt.answered_at)
    .execute(&mut *db)
    .await
    .map_err(write_err)?;

    Ok(res.last_insert_rowid())
}

fn count_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

#[async_trait::async_trait]
impl AttemptLogRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        insert_attempt(&mut db, attempt).await
    }

    async fn recent_attempts(
        &self,
        learner: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, topic_id, bloom_level, question,
                    chosen_option, correct_option, is_correct, answered_at
                FROM attempts
                WHERE learner_id = ?1
                ORDER BY answered_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn learner_stats(&self, learner: LearnerId) -> Result<LearnerStats, StorageError> {
        // answered_at is stored as RFC 3339 text in UTC, so the first ten
        // characters are the calendar day
        let row = sqlx::query(
            r"
                SELECT
                    COUNT(*) AS total,
                    COALESCE(SUM(is_correct), 0) AS correct,
                    COUNT(DISTINCT substr(answered_at, 1, 10)) AS days
                FROM attempts
                WHERE learner_id = ?1
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        Ok(LearnerStats {
            total_attempts: count_u32("total", row.try_get("total").map_err(ser)?)?,
            correct_attempts: count_u32("correct", row.try_get("correct").map_err(ser)?)?,
            active_days: count_u32("days", row.try_get("days").map_err(ser)?)?,
        })
    }
}
