use sqlx::SqlitePool;

use crate::models::{Collection, SyncRecord};
use crate::sync::{LocalStore, StoreError};

/// SQLite-backed local store.
///
/// Records are stored as JSON bodies keyed by (collection, id); the engine
/// treats domain fields opaquely, so no per-entity tables exist.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    body: String,
}

impl RecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, collection: Collection, record: &SyncRecord) -> Result<(), StoreError> {
        let body = serde_json::to_string(record)?;
        let updated_at = record.modified_at().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO records (collection, id, body, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(&record.id)
        .bind(&body)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl LocalStore for RecordRepository {
    async fn get_all(&self, collection: Collection) -> Result<Vec<SyncRecord>, StoreError> {
        let rows: Vec<RecordRow> =
            sqlx::query_as("SELECT body FROM records WHERE collection = ? ORDER BY id")
                .bind(collection.as_str())
                .fetch_all(&self.pool)
                .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(serde_json::from_str(&row.body)?);
        }
        Ok(records)
    }

    async fn save(&self, collection: Collection, record: &SyncRecord) -> Result<(), StoreError> {
        self.upsert(collection, record).await
    }

    async fn save_batch(
        &self,
        collection: Collection,
        records: &[SyncRecord],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            let body = serde_json::to_string(record)?;
            let updated_at = record.modified_at().to_rfc3339();

            sqlx::query(
                r#"
                INSERT INTO records (collection, id, body, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
                "#,
            )
            .bind(collection.as_str())
            .bind(&record.id)
            .bind(&body)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use serde_json::json;
    use tempfile::tempdir;

    async fn test_repo() -> (RecordRepository, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        (RecordRepository::new(pool), temp_dir)
    }

    fn record(id: &str, amount: i64) -> SyncRecord {
        serde_json::from_value(json!({
            "id": id,
            "updated_at": "2026-01-05T10:00:00Z",
            "amount_cents": amount
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_all() {
        let (repo, _temp) = test_repo().await;

        repo.save(Collection::Transactions, &record("t1", 10))
            .await
            .unwrap();
        repo.save(Collection::Transactions, &record("t2", 20))
            .await
            .unwrap();

        let records = repo.get_all(Collection::Transactions).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "t1");
        assert_eq!(records[1].fields["amount_cents"], json!(20));
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let (repo, _temp) = test_repo().await;

        repo.save(Collection::Transactions, &record("t1", 10))
            .await
            .unwrap();
        repo.save(Collection::Transactions, &record("t1", 99))
            .await
            .unwrap();

        let records = repo.get_all(Collection::Transactions).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields["amount_cents"], json!(99));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let (repo, _temp) = test_repo().await;

        repo.save(Collection::Transactions, &record("t1", 10))
            .await
            .unwrap();
        repo.save(Collection::Budgets, &record("b1", 40_000))
            .await
            .unwrap();

        assert_eq!(repo.get_all(Collection::Transactions).await.unwrap().len(), 1);
        assert_eq!(repo.get_all(Collection::Budgets).await.unwrap().len(), 1);
        assert!(repo.get_all(Collection::Goals).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_batch_and_clear() {
        let (repo, _temp) = test_repo().await;

        let records = vec![record("t1", 10), record("t2", 20), record("t3", 30)];
        repo.save_batch(Collection::Transactions, &records)
            .await
            .unwrap();
        assert_eq!(repo.get_all(Collection::Transactions).await.unwrap().len(), 3);

        repo.clear(Collection::Transactions).await.unwrap();
        assert!(repo.get_all(Collection::Transactions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, _temp) = test_repo().await;

        repo.save(Collection::Transactions, &record("t1", 10))
            .await
            .unwrap();
        repo.delete(Collection::Transactions, "t1").await.unwrap();
        repo.delete(Collection::Transactions, "missing").await.unwrap();

        assert!(repo.get_all(Collection::Transactions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_body_roundtrips_opaque_fields() {
        let (repo, _temp) = test_repo().await;

        let original: SyncRecord = serde_json::from_value(json!({
            "id": "t1",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-05T10:00:00Z",
            "amount_cents": 1250,
            "tags": ["food", "weekly"],
            "nested": { "a": 1 }
        }))
        .unwrap();

        repo.save(Collection::Transactions, &original).await.unwrap();
        let loaded = repo.get_all(Collection::Transactions).await.unwrap();
        assert_eq!(loaded[0], original);
    }
}
