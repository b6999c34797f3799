//! Indexing pipeline orchestration.
//!
//! Coordinates one run: enumerate jobs → feed the bounded queue → workers
//! → result collector. The collector is the only place that decides when
//! the run is over: once every dispatched job has reported back, when the
//! global deadline fires, or when the run is cancelled from outside.
//!
//! A successful job moves its leak file to `Done`. A failed job moves it
//! back to `Indexed` so the next run retries it. Jobs still running at
//! cancellation keep whatever status they had, normally `Processing`,
//! which the next run also picks up.

use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use leak_indexer_core::models::LeakStatus;
use leak_indexer_core::store::LeakStore;

use crate::config::Config;
use crate::db;
use crate::dispatch::WorkerPool;
use crate::enumerate::{enumerate_jobs, EnumerationStats};
use crate::migrate;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::sqlite_store::SqliteStore;
use crate::worker::{JobError, JobOutcome, JobStats, LeakWorker};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every dispatched job reported back.
    Completed,
    /// The global deadline fired first.
    DeadlineExpired,
    /// Cancelled from outside (e.g. Ctrl-C).
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Completed => "ok",
            RunOutcome::DeadlineExpired => "deadline expired",
            RunOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Summary of one indexing run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub enumeration: EnumerationStats,
    pub sent: u64,
    pub received: u64,
    pub completed: u64,
    pub failed: u64,
    pub totals: JobStats,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
}

/// `lidx index`: open the database, make sure the schema exists, and run
/// the pipeline over the configured collection.
pub async fn run_index(
    config: &Config,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let summary = run_pipeline(store, config, reporter, cancel).await;

    pool.close().await;
    summary
}

/// Run enumeration, dispatch, and collection against any store.
pub async fn run_pipeline(
    store: Arc<dyn LeakStore>,
    config: &Config,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("index", run_id = %run_id, collection = %config.source.collection);
    run_pipeline_inner(store, config, reporter, cancel, run_id)
        .instrument(span)
        .await
}

async fn run_pipeline_inner(
    store: Arc<dyn LeakStore>,
    config: &Config,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
    run_id: String,
) -> Result<RunSummary> {
    let started = Instant::now();
    let pipeline = &config.pipeline;
    let collection = config.source.collection.clone();

    info!(
        db = %config.db.path.display(),
        source = %config.source.collection_dir().display(),
        workers = pipeline.workers,
        batch_size = pipeline.batch_size,
        timeout_secs = pipeline.timeout_secs,
        "starting index run"
    );

    reporter.report(ProgressEvent::Enumerating {
        collection: collection.clone(),
    });
    let enumeration = enumerate_jobs(store.as_ref(), &config.source).await?;
    let sent = enumeration.jobs.len() as u64;
    info!(
        discovered = enumeration.stats.discovered,
        new = enumeration.stats.new,
        resumed = enumeration.stats.resumed,
        already_done = enumeration.stats.already_done,
        jobs = sent,
        "enumeration finished"
    );

    let mut summary = RunSummary {
        run_id,
        enumeration: enumeration.stats,
        sent,
        received: 0,
        completed: 0,
        failed: 0,
        totals: JobStats::default(),
        elapsed: Duration::ZERO,
        outcome: RunOutcome::Completed,
    };

    if sent == 0 {
        summary.elapsed = started.elapsed();
        return Ok(summary);
    }

    // One token for the deadline and the caller's abort.
    let run_cancel = cancel.child_token();
    let deadline = tokio::spawn({
        let token = run_cancel.clone();
        let timeout = pipeline.timeout();
        async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    token.cancel();
                    true
                }
                _ = token.cancelled() => false,
            }
        }
    });

    let worker = Arc::new(LeakWorker::new(store.clone(), pipeline.batch_size));
    let mut pool = WorkerPool::spawn(
        worker,
        pipeline.workers,
        pipeline.queue_capacity,
        run_cancel.clone(),
    );

    let feeder = pool.job_sender().map(|jobs_tx| {
        let token = run_cancel.clone();
        let jobs = enumeration.jobs;
        tokio::spawn(async move {
            for job in jobs {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    sent = jobs_tx.send(job) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    });
    pool.close_jobs();

    let mut collector = Collector {
        store: store.as_ref(),
        reporter,
        collection: &collection,
        summary: &mut summary,
    };
    let stopped_early = collector
        .collect(&mut pool, pipeline.tick(), &run_cancel)
        .await;

    run_cancel.cancel();
    if stopped_early {
        // Jobs in flight flush what they buffered before exiting.
        collector.drain(&mut pool).await;
    }
    let deadline_hit = deadline.await.unwrap_or(false);
    if let Some(feeder) = feeder {
        if let Err(e) = feeder.await {
            warn!(error = %e, "job feeder ended abnormally");
        }
    }
    pool.shutdown().await;

    summary.outcome = match (stopped_early, deadline_hit) {
        (false, _) => RunOutcome::Completed,
        (true, true) => RunOutcome::DeadlineExpired,
        (true, false) => RunOutcome::Cancelled,
    };
    summary.elapsed = started.elapsed();

    match summary.outcome {
        RunOutcome::Completed => info!(
            completed = summary.completed,
            failed = summary.failed,
            inserted = summary.totals.inserted,
            elapsed = ?summary.elapsed,
            "index run finished"
        ),
        outcome => warn!(
            %outcome,
            sent = summary.sent,
            received = summary.received,
            "index run stopped before all results were collected"
        ),
    }

    Ok(summary)
}

struct Collector<'a> {
    store: &'a dyn LeakStore,
    reporter: &'a dyn ProgressReporter,
    collection: &'a str,
    summary: &'a mut RunSummary,
}

impl Collector<'_> {
    /// Consume results until `received == sent`.
    ///
    /// Returns `true` if the loop stopped early on cancellation (deadline
    /// or abort) or because the workers went away.
    async fn collect(
        &mut self,
        pool: &mut WorkerPool<LeakWorker>,
        tick: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.summary.received == self.summary.sent {
                return false;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return true,
                outcome = pool.recv() => match outcome {
                    Some(outcome) => self.record(outcome).await,
                    None => {
                        warn!(
                            outstanding = self.summary.sent - self.summary.received,
                            "all workers exited before every result arrived"
                        );
                        return true;
                    }
                },
                _ = ticker.tick() => {
                    debug!(sent = self.summary.sent, received = self.summary.received, "waiting for results");
                }
            }
        }
    }

    /// Account for results that arrive after the run stopped, until every
    /// worker has exited. They do not count as received.
    async fn drain(&mut self, pool: &mut WorkerPool<LeakWorker>) {
        let mut late = 0u64;
        while let Some(outcome) = pool.recv().await {
            late += 1;
            self.apply(outcome).await;
        }
        if late > 0 {
            debug!(late, "collected results from jobs stopped by cancellation");
        }
    }

    async fn record(&mut self, outcome: JobOutcome) {
        self.summary.received += 1;
        self.reporter.report(ProgressEvent::Indexing {
            collection: self.collection.to_string(),
            sent: self.summary.sent,
            received: self.summary.received,
        });
        self.apply(outcome).await;
    }

    async fn apply(&mut self, outcome: JobOutcome) {
        let job = &outcome.job;
        match &outcome.result {
            Ok(stats) => {
                self.summary.completed += 1;
                self.summary.totals.add(stats);
                debug!(
                    worker = outcome.worker_id,
                    path = %job.path.display(),
                    inserted = stats.inserted,
                    duplicates = stats.duplicates,
                    skipped = stats.skipped,
                    elapsed = ?outcome.elapsed,
                    "leak file done"
                );
                self.set_status(job.leak_id, LeakStatus::Done).await;
            }
            Err(JobError::Cancelled { flushed }) => {
                self.summary.failed += 1;
                self.summary.totals.inserted += flushed;
                warn!(path = %job.path.display(), flushed, "leak file cancelled");
            }
            Err(e) => {
                self.summary.failed += 1;
                error!(path = %job.path.display(), error = %e, "leak file failed");
                self.set_status(job.leak_id, LeakStatus::Indexed).await;
            }
        }
    }

    async fn set_status(&self, leak_id: i64, status: LeakStatus) {
        if let Err(e) = self.store.update_status(leak_id, status).await {
            warn!(leak_id, %status, error = %e, "could not update leak status");
        }
    }
}
