use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::SqliteInitError;

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn mark_applied(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Apply pending schema versions in order, each inside its own transaction.
///
/// 1. learners, study plans, topics, mastery records and attempts
/// 2. vocabulary
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS learners (
                    id INTEGER PRIMARY KEY,
                    display_name TEXT,
                    proficiency TEXT NOT NULL
                        CHECK (proficiency IN ('beginner', 'intermediate', 'advanced')),
                    goal TEXT,
                    current_topic_id INTEGER,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (current_topic_id) REFERENCES topics(id) ON DELETE SET NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS study_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    learner_id INTEGER NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS topics (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plan_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 1),
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    UNIQUE (plan_id, position),
                    FOREIGN KEY (plan_id) REFERENCES study_plans(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS mastery_records (
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    bloom_level INTEGER NOT NULL CHECK (bloom_level BETWEEN 1 AND 6),
                    correct_streak INTEGER NOT NULL CHECK (correct_streak >= 0),
                    is_completed INTEGER NOT NULL CHECK (is_completed IN (0, 1)),
                    total_attempts INTEGER NOT NULL CHECK (total_attempts >= 0),
                    correct_attempts INTEGER NOT NULL
                        CHECK (correct_attempts BETWEEN 0 AND total_attempts),
                    version INTEGER NOT NULL CHECK (version >= 1),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (learner_id, topic_id),
                    FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempts (
                    id INTEGER PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    bloom_level INTEGER NOT NULL CHECK (bloom_level BETWEEN 1 AND 6),
                    question TEXT NOT NULL,
                    chosen_option TEXT NOT NULL,
                    correct_option TEXT NOT NULL,
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    answered_at TEXT NOT NULL,
                    FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_learner_answered_at
                    ON attempts (learner_id, answered_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, 1).await?;
        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS vocabulary (
                    id INTEGER PRIMARY KEY,
                    word TEXT NOT NULL UNIQUE,
                    translation TEXT NOT NULL,
                    part_of_speech TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        mark_applied(&mut tx, 2).await?;
        tx.commit().await?;
        tracing::info!(version = 2, "applied schema migration");
    }

    Ok(())
}
