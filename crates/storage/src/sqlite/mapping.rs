use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tutor_core::model::{
    AttemptRecord, BloomLevel, Learner, LearnerId, MasteryRecord, PlanId, Proficiency, Topic,
    TopicId, VocabularyEntry,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Like [`conn`], but maps constraint violations of a write to their meaning:
/// a unique clash is a `Conflict`, a dangling reference is `NotFound`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    conn(e)
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn plan_id_from_i64(v: i64) -> Result<PlanId, StorageError> {
    Ok(PlanId::new(i64_to_u64("plan_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

fn bloom_from_row(row: &SqliteRow) -> Result<BloomLevel, StorageError> {
    BloomLevel::from_i64(row.try_get::<i64, _>("bloom_level").map_err(ser)?).map_err(ser)
}

pub(crate) fn map_learner_row(row: &SqliteRow) -> Result<Learner, StorageError> {
    let proficiency: String = row.try_get("proficiency").map_err(ser)?;
    Ok(Learner::from_persisted(
        learner_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get("display_name").map_err(ser)?,
        Proficiency::parse(&proficiency).map_err(ser)?,
        row.try_get("goal").map_err(ser)?,
        row.try_get::<Option<i64>, _>("current_topic_id")
            .map_err(ser)?
            .map(topic_id_from_i64)
            .transpose()?,
        row.try_get("created_at").map_err(ser)?,
    ))
}

pub(crate) fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Topic::from_persisted(
        topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        plan_id_from_i64(row.try_get::<i64, _>("plan_id").map_err(ser)?)?,
        i64_to_u32("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_mastery_row(row: &SqliteRow) -> Result<MasteryRecord, StorageError> {
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    MasteryRecord::from_persisted(
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        bloom_from_row(row)?,
        i64_to_u32("correct_streak", row.try_get("correct_streak").map_err(ser)?)?,
        row.try_get::<bool, _>("is_completed").map_err(ser)?,
        i64_to_u32("total_attempts", row.try_get("total_attempts").map_err(ser)?)?,
        i64_to_u32("correct_attempts", row.try_get("correct_attempts").map_err(ser)?)?,
        i64_to_u64("version", row.try_get("version").map_err(ser)?)?,
        updated_at,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<AttemptRecord, StorageError> {
    Ok(AttemptRecord {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        bloom_level: bloom_from_row(row)?,
        question: row.try_get("question").map_err(ser)?,
        chosen_option: row.try_get("chosen_option").map_err(ser)?,
        correct_option: row.try_get("correct_option").map_err(ser)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_vocabulary_row(row: &SqliteRow) -> Result<VocabularyEntry, StorageError> {
    let part_of_speech: Option<String> = row.try_get("part_of_speech").map_err(ser)?;
    Ok(VocabularyEntry::new(
        row.try_get::<String, _>("word").map_err(ser)?,
        row.try_get::<String, _>("translation").map_err(ser)?,
        part_of_speech.as_deref(),
    ))
}
