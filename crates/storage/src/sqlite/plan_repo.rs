use chrono::{DateTime, Utc};
use sqlx::Row;
use tutor_core::model::{LearnerId, StudyPlan, StudyPlanDraft};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, learner_id_from_i64, map_topic_row, plan_id_from_i64, ser, write_err},
};
use crate::repository::{StorageError, StudyPlanRepository};

impl SqliteRepository {
    async fn load_plan_topics(
        &self,
        plan_id: i64,
    ) -> Result<Vec<tutor_core::model::Topic>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, plan_id, position, name, description
                FROM topics
                WHERE plan_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_topic_row).collect()
    }
}

#[async_trait::async_trait]
impl StudyPlanRepository for SqliteRepository {
    async fn insert_plan(
        &self,
        draft: &StudyPlanDraft,
        created_at: DateTime<Utc>,
    ) -> Result<StudyPlan, StorageError> {
        let draft = draft.clone().validate().map_err(ser)?;
        let learner_id = id_i64("learner_id", draft.learner_id.value())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let plan_id = sqlx::query("INSERT INTO study_plans (learner_id, created_at) VALUES (?1, ?2)")
            .bind(learner_id)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?
            .last_insert_rowid();

        for (position, topic) in (1_i64..).zip(&draft.topics) {
            sqlx::query(
                r"
                    INSERT INTO topics (plan_id, position, name, description)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(plan_id)
            .bind(position)
            .bind(topic.name.trim())
            .bind(topic.description.trim())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn)?;

        let topics = self.load_plan_topics(plan_id).await?;
        StudyPlan::from_persisted(plan_id_from_i64(plan_id)?, draft.learner_id, topics, created_at)
            .map_err(ser)
    }

    async fn load_plan(&self, learner: LearnerId) -> Result<Option<StudyPlan>, StorageError> {
        let Some(row) = sqlx::query(
            r"
                SELECT id, learner_id, created_at
                FROM study_plans
                WHERE learner_id = ?1
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let plan_id: i64 = row.try_get("id").map_err(ser)?;
        let topics = self.load_plan_topics(plan_id).await?;
        StudyPlan::from_persisted(
            plan_id_from_i64(plan_id)?,
            learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
            topics,
            row.try_get("created_at").map_err(ser)?,
        )
        .map(Some)
        .map_err(ser)
    }
}
