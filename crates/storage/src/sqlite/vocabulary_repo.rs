use tutor_core::model::VocabularyEntry;

use super::{
    SqliteRepository,
    mapping::{conn, map_vocabulary_row, write_err},
};
use crate::repository::{StorageError, VocabularyRepository};

#[async_trait::async_trait]
impl VocabularyRepository for SqliteRepository {
    async fn insert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for entry in entries {
            sqlx::query(
                r"
                    INSERT INTO vocabulary (word, translation, part_of_speech)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(word) DO UPDATE SET
                        translation = excluded.translation,
                        part_of_speech = excluded.part_of_speech
                ",
            )
            .bind(&entry.word)
            .bind(&entry.translation)
            .bind(entry.part_of_speech.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(entries.len())
    }

    async fn sample_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyEntry>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT word, translation, part_of_speech
                FROM vocabulary
                ORDER BY RANDOM()
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_vocabulary_row).collect()
    }
}
