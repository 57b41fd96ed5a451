use tutor_core::model::{Learner, LearnerId, TopicId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_learner_row},
};
use crate::repository::{LearnerRepository, StorageError};

#[async_trait::async_trait]
impl LearnerRepository for SqliteRepository {
    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO learners (
                id, display_name, proficiency, goal, current_topic_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, NULL, ?5)
            ON CONFLICT(id) DO UPDATE SET
                -- created_at and current_topic_id are left as stored
                display_name = excluded.display_name,
                proficiency = excluded.proficiency,
                goal = excluded.goal
            ",
        )
        .bind(id_i64("learner_id", learner.id().value())?)
        .bind(learner.display_name())
        .bind(learner.proficiency().as_str())
        .bind(learner.goal())
        .bind(learner.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, display_name, proficiency, goal, current_topic_id, created_at
                FROM learners
                WHERE id = ?1
            ",
        )
        .bind(id_i64("learner_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_learner_row(&row)
    }

    async fn save_current_topic(
        &self,
        learner: LearnerId,
        topic: Option<TopicId>,
    ) -> Result<(), StorageError> {
        let topic = topic.map(|t| id_i64("topic_id", t.value())).transpose()?;

        let res = sqlx::query("UPDATE learners SET current_topic_id = ?1 WHERE id = ?2")
            .bind(topic)
            .bind(id_i64("learner_id", learner.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
