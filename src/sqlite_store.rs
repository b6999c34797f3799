//! SQLite-backed [`LeakStore`] implementation.
//!
//! Every check-then-act sequence (credential lookup, host lookup-or-insert,
//! batch flush) runs behind one process-wide async mutex, so two workers
//! can never both decide that the same host or credential is missing. The
//! `UNIQUE` constraints stay as the last line: inserts use
//! `ON CONFLICT ... DO NOTHING` and a rejected row counts as a duplicate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use leak_indexer_core::models::{BatchOutcome, LeakRef, LeakStatus, NewCredential, NewLeakFile};
use leak_indexer_core::store::LeakStore;

/// SQLite implementation of the [`LeakStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }
}

fn decode_status(raw: i64) -> Result<LeakStatus> {
    LeakStatus::from_i64(raw).with_context(|| format!("unknown leak status value {}", raw))
}

#[async_trait]
impl LeakStore for SqliteStore {
    async fn find_leak(&self, fingerprint: &str) -> Result<Option<LeakRef>> {
        let row = sqlx::query("SELECT id, status FROM leaks WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(LeakRef {
                id: row.get("id"),
                status: decode_status(row.get("status"))?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_leak(&self, leak: &NewLeakFile) -> Result<i64> {
        let _guard = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO leaks (name, parent, filename, fingerprint, discovered_at, source, line_count, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
        )
        .bind(&leak.name)
        .bind(&leak.parent)
        .bind(&leak.filename)
        .bind(&leak.fingerprint)
        .bind(leak.discovered_at)
        .bind(&leak.source)
        .bind(leak.line_count)
        .bind(leak.status.as_i64())
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM leaks WHERE fingerprint = ?")
            .bind(&leak.fingerprint)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn read_status(&self, leak_id: i64) -> Result<Option<LeakStatus>> {
        let raw: Option<i64> = sqlx::query_scalar("SELECT status FROM leaks WHERE id = ?")
            .bind(leak_id)
            .fetch_optional(&self.pool)
            .await?;

        raw.map(decode_status).transpose()
    }

    async fn update_status(&self, leak_id: i64, status: LeakStatus) -> Result<()> {
        let result = sqlx::query("UPDATE leaks SET status = ? WHERE id = ?")
            .bind(status.as_i64())
            .bind(leak_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("leak {} not found", leak_id);
        }
        Ok(())
    }

    async fn credential_exists(&self, fingerprint: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM credentials WHERE fingerprint = ?")
                .bind(fingerprint)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn host_id(&self, domain: &str) -> Result<i64> {
        let _guard = self.write_lock.lock().await;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM hosts WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        sqlx::query("INSERT INTO hosts (domain) VALUES (?) ON CONFLICT(domain) DO NOTHING")
            .bind(domain)
            .execute(&self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM hosts WHERE domain = ?")
            .bind(domain)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    async fn insert_credentials(&self, batch: &[NewCredential]) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut outcome = BatchOutcome::default();

        for cred in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO credentials (email, username, password, fingerprint, valid, host_id, leak_id, first_seen)
                VALUES (?, ?, ?, ?, 0, ?, ?, ?)
                ON CONFLICT(fingerprint) DO NOTHING
                "#,
            )
            .bind(&cred.email)
            .bind(&cred.username)
            .bind(&cred.password)
            .bind(&cred.fingerprint)
            .bind(cred.host_id)
            .bind(cred.leak_id)
            .bind(cred.first_seen)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use leak_indexer_core::fingerprint;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("leaks.sqlite"))
            .await
            .unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn leak() -> NewLeakFile {
        NewLeakFile {
            name: "dump".to_string(),
            parent: "Collection 1".to_string(),
            filename: "a.txt".to_string(),
            fingerprint: fingerprint::leak_file("Collection 1", "dump", "a.txt"),
            discovered_at: 1_700_000_000,
            source: "test".to_string(),
            line_count: 4,
            status: LeakStatus::Indexed,
        }
    }

    #[tokio::test]
    async fn leak_lifecycle() {
        let (_tmp, store) = store().await;
        let id = store.insert_leak(&leak()).await.unwrap();
        assert_eq!(store.insert_leak(&leak()).await.unwrap(), id);

        let found = store.find_leak(&leak().fingerprint).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.status, LeakStatus::Indexed);

        store.update_status(id, LeakStatus::Processing).await.unwrap();
        assert_eq!(
            store.read_status(id).await.unwrap(),
            Some(LeakStatus::Processing)
        );
        assert!(store.update_status(id + 100, LeakStatus::Done).await.is_err());
        assert!(store.find_leak("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_credentials_are_not_errors() {
        let (_tmp, store) = store().await;
        let leak_id = store.insert_leak(&leak()).await.unwrap();
        let host_id = store.host_id("x.com").await.unwrap();
        assert_eq!(store.host_id("x.com").await.unwrap(), host_id);

        let cred = NewCredential {
            email: "a@x.com".to_string(),
            username: "a".to_string(),
            password: "pw1".to_string(),
            fingerprint: fingerprint::credential("a@x.com", "pw1"),
            host_id,
            leak_id,
            first_seen: 1_700_000_000,
        };

        let first = store
            .insert_credentials(&[cred.clone(), cred.clone()])
            .await
            .unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.duplicates, 1);

        let second = store.insert_credentials(&[cred.clone()]).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert!(store.credential_exists(&cred.fingerprint).await.unwrap());
    }
}
