use sqlx::SqliteConnection;
use tutor_core::model::{LearnerId, MasteryRecord, TopicId};

use super::{
    SqliteRepository,
    attempt_repo::insert_attempt,
    mapping::{conn, id_i64, map_mastery_row, write_err},
};
use crate::repository::{MasteryRepository, ProgressionCommit, ProgressionPersistence, StorageError};

const MASTERY_COLUMNS: &str = r"
    learner_id, topic_id, bloom_level, correct_streak, is_completed,
    total_attempts, correct_attempts, version, updated_at
";

/// Versioned write of one record. A record that was never stored is inserted
/// and must not exist yet; otherwise the stored version must match.
async fn write_mastery(
    db: &mut SqliteConnection,
    record: &MasteryRecord,
) -> Result<MasteryRecord, StorageError> {
    let mut saved = record.clone();
    saved.mark_saved();

    let learner_id = id_i64("learner_id", record.learner_id().value())?;
    let topic_id = id_i64("topic_id", record.topic_id().value())?;
    let expected = id_i64("version", record.expected_version())?;
    let next = id_i64("version", saved.version())?;

    if record.is_persisted() {
        let res = sqlx::query(
            r"
                UPDATE mastery_records SET
                    bloom_level = ?3,
                    correct_streak = ?4,
                    is_completed = ?5,
                    total_attempts = ?6,
                    correct_attempts = ?7,
                    version = ?8,
                    updated_at = ?9
                WHERE learner_id = ?1 AND topic_id = ?2 AND version = ?10
            ",
        )
        .bind(learner_id)
        .bind(topic_id)
        .bind(i64::from(saved.bloom_level().value()))
        .bind(i64::from(saved.correct_streak()))
        .bind(saved.is_completed())
        .bind(i64::from(saved.total_attempts()))
        .bind(i64::from(saved.correct_attempts()))
        .bind(next)
        .bind(saved.updated_at())
        .bind(expected)
        .execute(&mut *db)
        .await
        .map_err(write_err)?;

        if res.rows_affected() == 0 {
            tracing::debug!(
                learner = %record.learner_id(),
                topic = %record.topic_id(),
                expected,
                "mastery version mismatch"
            );
            return Err(StorageError::Conflict);
        }
    } else {
        sqlx::query(&format!(
            "INSERT INTO mastery_records ({MASTERY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))
        .bind(learner_id)
        .bind(topic_id)
        .bind(i64::from(saved.bloom_level().value()))
        .bind(i64::from(saved.correct_streak()))
        .bind(saved.is_completed())
        .bind(i64::from(saved.total_attempts()))
        .bind(i64::from(saved.correct_attempts()))
        .bind(next)
        .bind(saved.updated_at())
        .execute(&mut *db)
        .await
        .map_err(write_err)?;
    }

    Ok(saved)
}

#[async_trait::async_trait]
impl MasteryRepository for SqliteRepository {
    async fn load_mastery(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {MASTERY_COLUMNS} FROM mastery_records WHERE learner_id = ?1 AND topic_id = ?2"
        ))
        .bind(id_i64("learner_id", learner.value())?)
        .bind(id_i64("topic_id", topic.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_mastery_row).transpose()
    }

    async fn save_mastery(&self, record: &MasteryRecord) -> Result<MasteryRecord, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        write_mastery(&mut db, record).await
    }

    async fn mastery_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {MASTERY_COLUMNS} FROM mastery_records WHERE learner_id = ?1 ORDER BY topic_id ASC"
        ))
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_mastery_row).collect()
    }
}

#[async_trait::async_trait]
impl ProgressionPersistence for SqliteRepository {
    async fn commit_progression(
        &self,
        commit: &ProgressionCommit,
    ) -> Result<MasteryRecord, StorageError> {
        let record = &commit.record;
        if commit.attempt.learner_id != record.learner_id()
            || commit.attempt.topic_id != record.topic_id()
        {
            return Err(StorageError::Conflict);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let saved = write_mastery(&mut tx, record).await?;
        insert_attempt(&mut tx, &commit.attempt).await?;

        if let Some(topic) = commit.advance_to {
            let res = sqlx::query("UPDATE learners SET current_topic_id = ?1 WHERE id = ?2")
                .bind(id_i64("topic_id", topic.value())?)
                .bind(id_i64("learner_id", record.learner_id().value())?)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
            if res.rows_affected() == 0 {
                return Err(StorageError::NotFound);
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(saved)
    }
}
