//! Leak-file worker.
//!
//! Turns one [`LeakJob`] into credential rows: marks the file
//! `Processing`, scans it line by line, drops lines that do not parse,
//! skips credentials whose fingerprint is already stored, and flushes new
//! ones in batches. The collector, not the worker, marks the file `Done`.
//!
//! Lines are read as bytes and decoded lossily, so a stray non-UTF-8 byte
//! costs one line, never the whole file.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use leak_indexer_core::fingerprint;
use leak_indexer_core::models::{LeakStatus, NewCredential};
use leak_indexer_core::parse::parse_line;
use leak_indexer_core::store::LeakStore;

use crate::dispatch::JobHandler;
use crate::enumerate::LeakJob;

/// Why a job did not complete.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read failed in {path} after line {line}: {source}")]
    Read {
        path: PathBuf,
        line: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("cancelled after flushing {flushed} credentials")]
    Cancelled { flushed: u64 },
}

/// Per-job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Lines read from the file.
    pub lines: u64,
    /// Lines that did not parse as a credential.
    pub skipped: u64,
    /// Credentials written to the store.
    pub inserted: u64,
    /// Credentials already known (stored earlier or repeated in this file).
    pub duplicates: u64,
    /// Credentials lost to store failures (host lookup or batch flush).
    pub failed: u64,
}

impl JobStats {
    pub fn add(&mut self, other: &JobStats) {
        self.lines += other.lines;
        self.skipped += other.skipped;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }
}

/// The result a worker hands back to the collector for one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: LeakJob,
    pub worker_id: usize,
    pub elapsed: Duration,
    pub result: Result<JobStats, JobError>,
}

/// Processes leak files against a shared store.
pub struct LeakWorker {
    store: Arc<dyn LeakStore>,
    batch_size: usize,
}

impl LeakWorker {
    pub fn new(store: Arc<dyn LeakStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    async fn process(
        &self,
        job: &LeakJob,
        cancel: &CancellationToken,
    ) -> Result<JobStats, JobError> {
        if let Err(e) = self
            .store
            .update_status(job.leak_id, LeakStatus::Processing)
            .await
        {
            warn!(leak_id = job.leak_id, error = %e, "could not mark leak file as processing");
        }

        let file = File::open(&job.path).await.map_err(|source| JobError::Open {
            path: job.path.clone(),
            source,
        })?;

        let mut batch = Batch::new(self.batch_size, job.leak_id);
        let mut stats = JobStats::default();
        // `Ok(false)`: stopped by cancellation before end of file.
        let scanned = self.scan(job, file, &mut batch, &mut stats, cancel).await;

        // Whatever was buffered is flushed, even when the scan stopped early.
        self.flush(&mut batch, &mut stats).await;

        match scanned {
            Ok(true) => Ok(stats),
            Ok(false) => {
                warn!(
                    path = %job.path.display(),
                    flushed = stats.inserted,
                    "job cancelled, file left in processing"
                );
                Err(JobError::Cancelled {
                    flushed: stats.inserted,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn scan(
        &self,
        job: &LeakJob,
        file: File,
        batch: &mut Batch,
        stats: &mut JobStats,
        cancel: &CancellationToken,
    ) -> Result<bool, JobError> {
        let mut reader = BufReader::new(file);
        let mut buf = Vec::with_capacity(256);
        let mut hosts: HashMap<String, i64> = HashMap::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(false),
                read = reader.read_until(b'\n', &mut buf) => read,
            };
            let n = read.map_err(|source| JobError::Read {
                path: job.path.clone(),
                line: stats.lines,
                source,
            })?;
            if n == 0 {
                return Ok(true);
            }
            stats.lines += 1;

            let text = String::from_utf8_lossy(&buf);
            let Some(parsed) = parse_line(text.trim_end_matches('\n')) else {
                stats.skipped += 1;
                continue;
            };

            let fp = fingerprint::credential(parsed.email, parsed.password);
            if batch.contains(&fp) {
                stats.duplicates += 1;
                continue;
            }
            match self.store.credential_exists(&fp).await {
                Ok(true) => {
                    stats.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                // The unique constraint still rejects it at flush time if it exists.
                Err(e) => debug!(error = %e, "credential lookup failed, deferring to insert"),
            }

            let host_id = match hosts.get(parsed.domain) {
                Some(&id) => id,
                None => match self.store.host_id(parsed.domain).await {
                    Ok(id) => {
                        hosts.insert(parsed.domain.to_string(), id);
                        id
                    }
                    Err(e) => {
                        warn!(domain = parsed.domain, error = %e, "could not resolve host, dropping credential");
                        stats.failed += 1;
                        continue;
                    }
                },
            };

            batch.push(NewCredential {
                email: parsed.email.to_string(),
                username: parsed.username.to_string(),
                password: parsed.password.to_string(),
                fingerprint: fp,
                host_id,
                leak_id: job.leak_id,
                first_seen: Utc::now().timestamp(),
            });

            if batch.is_full() {
                self.flush(batch, stats).await;
            }
        }
    }

    async fn flush(&self, batch: &mut Batch, stats: &mut JobStats) {
        if batch.rows.is_empty() {
            return;
        }
        match self.store.insert_credentials(&batch.rows).await {
            Ok(outcome) => {
                stats.inserted += outcome.inserted;
                stats.duplicates += outcome.duplicates;
            }
            Err(e) => {
                warn!(
                    leak_id = batch.leak_id,
                    rows = batch.rows.len(),
                    error = %e,
                    "credential batch flush failed"
                );
                stats.failed += batch.rows.len() as u64;
            }
        }
        batch.clear();
    }
}

#[async_trait]
impl JobHandler for LeakWorker {
    type Job = LeakJob;
    type Output = JobOutcome;

    async fn handle(&self, worker_id: usize, job: LeakJob, cancel: &CancellationToken) -> JobOutcome {
        let started = Instant::now();
        debug!(
            worker = worker_id,
            parent = %job.parent,
            folder = %job.folder,
            file = %job.file,
            "processing leak file"
        );
        let result = self.process(&job, cancel).await;
        JobOutcome {
            job,
            worker_id,
            elapsed: started.elapsed(),
            result,
        }
    }
}

/// Credential rows buffered for one flush.
struct Batch {
    rows: Vec<NewCredential>,
    pending: HashSet<String>,
    capacity: usize,
    leak_id: i64,
}

impl Batch {
    fn new(capacity: usize, leak_id: i64) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            pending: HashSet::with_capacity(capacity),
            capacity,
            leak_id,
        }
    }

    fn contains(&self, fingerprint: &str) -> bool {
        self.pending.contains(fingerprint)
    }

    fn push(&mut self, cred: NewCredential) {
        self.pending.insert(cred.fingerprint.clone());
        self.rows.push(cred);
    }

    fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.pending.clear();
    }
}
