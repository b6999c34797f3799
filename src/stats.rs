//! Database statistics.
//!
//! A quick summary of what's indexed: leak files per status, hosts,
//! credentials, and the busiest domains. Used by `lidx stats` to check
//! that runs are progressing and resumable work is visible.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use leak_indexer_core::models::LeakStatus;

use crate::config::Config;
use crate::{db, migrate};
use crate::progress::format_number;

/// Counts read from the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub leaks_indexed: i64,
    pub leaks_processing: i64,
    pub leaks_done: i64,
    pub hosts: i64,
    pub credentials: i64,
    pub total_lines: i64,
    /// `(domain, credential count)`, busiest first.
    pub top_domains: Vec<(String, i64)>,
}

impl IndexStats {
    pub fn leak_files(&self) -> i64 {
        self.leaks_indexed + self.leaks_processing + self.leaks_done
    }
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<IndexStats> {
    let mut stats = IndexStats::default();

    let status_rows = sqlx::query(
        "SELECT status, COUNT(*) AS n, COALESCE(SUM(line_count), 0) AS lines FROM leaks GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    for row in &status_rows {
        let n: i64 = row.get("n");
        let lines: i64 = row.get("lines");
        stats.total_lines += lines;
        match LeakStatus::from_i64(row.get("status")) {
            Some(LeakStatus::Indexed) => stats.leaks_indexed += n,
            Some(LeakStatus::Processing) => stats.leaks_processing += n,
            Some(LeakStatus::Done) => stats.leaks_done += n,
            None => {}
        }
    }

    stats.hosts = sqlx::query_scalar("SELECT COUNT(*) FROM hosts")
        .fetch_one(pool)
        .await?;
    stats.credentials = sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
        .fetch_one(pool)
        .await?;

    let domain_rows = sqlx::query(
        r#"
        SELECT h.domain AS domain, COUNT(c.id) AS n
        FROM hosts h
        JOIN credentials c ON c.host_id = h.id
        GROUP BY h.id
        ORDER BY n DESC, h.domain ASC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;
    stats.top_domains = domain_rows
        .iter()
        .map(|row| (row.get("domain"), row.get("n")))
        .collect();

    Ok(stats)
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Leak Indexer: Database Stats");
    println!("============================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Leak files:   {}", format_number(stats.leak_files() as u64));
    println!("    indexed:    {}", format_number(stats.leaks_indexed as u64));
    println!("    processing: {}", format_number(stats.leaks_processing as u64));
    println!("    done:       {}", format_number(stats.leaks_done as u64));
    println!("  Lines:        {}", format_number(stats.total_lines as u64));
    println!("  Hosts:        {}", format_number(stats.hosts as u64));
    println!("  Credentials:  {}", format_number(stats.credentials as u64));

    if !stats.top_domains.is_empty() {
        println!();
        println!("  Top domains:");
        println!("  {:<40} {:>12}", "DOMAIN", "CREDENTIALS");
        println!("  {}", "-".repeat(53));
        for (domain, n) in &stats.top_domains {
            println!("  {:<40} {:>12}", domain, format_number(*n as u64));
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
