use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Create hosts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hosts (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            domain TEXT NOT NULL UNIQUE,
            smtp TEXT,
            smtp_port INTEGER,
            imap TEXT,
            imap_port INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create leaks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leaks (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent TEXT NOT NULL,
            filename TEXT NOT NULL,
            fingerprint TEXT NOT NULL UNIQUE,
            discovered_at INTEGER NOT NULL,
            source TEXT,
            line_count INTEGER NOT NULL DEFAULT 0,
            status INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create credentials table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            username TEXT NOT NULL,
            password TEXT NOT NULL,
            fingerprint TEXT NOT NULL UNIQUE,
            valid INTEGER NOT NULL DEFAULT 0,
            host_id INTEGER NOT NULL,
            leak_id INTEGER NOT NULL,
            first_seen INTEGER NOT NULL,
            FOREIGN KEY (host_id) REFERENCES hosts(id),
            FOREIGN KEY (leak_id) REFERENCES leaks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leaks_status ON leaks(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_credentials_leak_id ON credentials(leak_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_credentials_host_id ON credentials(host_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete every row so the next run starts from scratch.
///
/// Returns the number of leak files that were forgotten.
pub async fn reset_database(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM credentials")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM hosts").execute(&mut *tx).await?;
    let leaks = sqlx::query("DELETE FROM leaks").execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(leaks.rows_affected())
}
