//! Pull-based dispatcher and fixed-size worker pool.
//!
//! ```text
//!  jobs (bounded) ──▶ router ──▶ worker slot ──▶ JobHandler ──▶ results
//!                       ▲                                 │
//!                       └──── ready queue (capacity N) ◀──┘
//! ```
//!
//! Each idle worker registers its private input slot in the ready queue.
//! The router pairs the next queued job with the next ready slot, so a
//! slow file never holds up jobs that a free worker could take. A worker
//! registers only while idle and its slot holds at most one job, so no job
//! reaches two workers and no worker runs two jobs at once.
//!
//! Cancellation stops routing immediately. Jobs still in the queue at that
//! point are drained and discarded.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Work performed by every worker in the pool.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Job: Send + 'static;
    type Output: Send + 'static;

    /// Process one job to completion and produce exactly one output.
    ///
    /// `cancel` fires when the pipeline is aborted; handlers should stop at
    /// their next safe point and still return an output.
    async fn handle(&self, worker_id: usize, job: Self::Job, cancel: &CancellationToken)
        -> Self::Output;
}

/// A running dispatcher with its workers.
pub struct WorkerPool<H: JobHandler> {
    jobs: Option<mpsc::Sender<H::Job>>,
    results: mpsc::Receiver<H::Output>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl<H: JobHandler> WorkerPool<H> {
    /// Start `workers` workers and the routing task.
    ///
    /// `queue_capacity` bounds the job queue; the ready queue holds `workers`
    /// entries and the result queue as many.
    pub fn spawn(
        handler: Arc<H>,
        workers: usize,
        queue_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<H::Job>(queue_capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::channel::<mpsc::Sender<H::Job>>(workers);
        let (result_tx, result_rx) = mpsc::channel::<H::Output>(workers);

        let mut tasks = JoinSet::new();
        for id in 1..=workers {
            debug!(worker = id, total = workers, "starting worker");
            tasks.spawn(run_worker(
                id,
                handler.clone(),
                ready_tx.clone(),
                result_tx.clone(),
                cancel.clone(),
            ));
        }
        tasks.spawn(route(job_rx, ready_rx, cancel.clone()));

        Self {
            jobs: Some(job_tx),
            results: result_rx,
            cancel,
            tasks,
        }
    }

    /// Sender side of the bounded job queue.
    ///
    /// Cloned senders keep the queue open; the router stops once every
    /// sender is dropped and the queue is empty, or on cancellation.
    pub fn job_sender(&self) -> Option<mpsc::Sender<H::Job>> {
        self.jobs.clone()
    }

    /// Close the pool's own job sender. Queued jobs are still delivered.
    pub fn close_jobs(&mut self) {
        self.jobs = None;
    }

    /// Receive the next result; `None` once every worker has exited.
    pub async fn recv(&mut self) -> Option<H::Output> {
        self.results.recv().await
    }

    /// Cancel, stop accepting results, and wait for every task to exit.
    ///
    /// Workers in the middle of a job observe the cancellation and finish
    /// their cleanup before this returns.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.jobs = None;
        self.results.close();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }
    }
}

async fn route<J: Send + 'static>(
    mut jobs: mpsc::Receiver<J>,
    mut ready: mpsc::Receiver<mpsc::Sender<J>>,
    cancel: CancellationToken,
) {
    'routing: loop {
        let mut job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = jobs.recv() => match next {
                Some(job) => job,
                None => break,
            },
        };

        // A slot whose worker already exited hands the job back; try the next one.
        loop {
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'routing,
                next = ready.recv() => match next {
                    Some(slot) => slot,
                    None => break 'routing,
                },
            };
            match slot.send(job).await {
                Ok(()) => break,
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }
    }

    jobs.close();
    let mut discarded = 0usize;
    while jobs.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "discarded queued jobs after cancellation");
    }
}

async fn run_worker<H: JobHandler>(
    id: usize,
    handler: Arc<H>,
    ready: mpsc::Sender<mpsc::Sender<H::Job>>,
    results: mpsc::Sender<H::Output>,
    cancel: CancellationToken,
) {
    let (slot_tx, mut slot_rx) = mpsc::channel::<H::Job>(1);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            registered = ready.send(slot_tx.clone()) => {
                if registered.is_err() {
                    break;
                }
            }
        }

        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = slot_rx.recv() => match next {
                Some(job) => job,
                None => break,
            },
        };

        let output = handler.handle(id, job, &cancel).await;
        if results.send(output).await.is_err() {
            break;
        }
    }

    debug!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records which worker saw which job and checks no worker overlaps itself.
    struct Recorder {
        busy: Vec<AtomicBool>,
        seen: Mutex<Vec<(usize, u32)>>,
        overlaps: AtomicUsize,
    }

    impl Recorder {
        fn new(workers: usize) -> Self {
            Self {
                busy: (0..=workers).map(|_| AtomicBool::new(false)).collect(),
                seen: Mutex::new(Vec::new()),
                overlaps: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandler for Recorder {
        type Job = u32;
        type Output = u32;

        async fn handle(&self, worker_id: usize, job: u32, _cancel: &CancellationToken) -> u32 {
            if self.busy[worker_id].swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            // Uneven work so fast workers pick up more jobs.
            tokio::time::sleep(Duration::from_millis((job % 5) as u64)).await;
            self.seen.lock().unwrap().push((worker_id, job));
            self.busy[worker_id].store(false, Ordering::SeqCst);
            job
        }
    }

    #[tokio::test]
    async fn every_job_delivered_exactly_once() {
        let handler = Arc::new(Recorder::new(4));
        let mut pool = WorkerPool::spawn(handler.clone(), 4, 8, CancellationToken::new());

        let sender = pool.job_sender().unwrap();
        pool.close_jobs();
        tokio::spawn(async move {
            for job in 0..100u32 {
                sender.send(job).await.unwrap();
            }
        });

        let mut outputs = HashSet::new();
        for _ in 0..100 {
            assert!(outputs.insert(pool.recv().await.unwrap()));
        }
        pool.shutdown().await;

        assert_eq!(outputs, (0..100).collect::<HashSet<_>>());
        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(handler.overlaps.load(Ordering::SeqCst), 0);
    }

    struct Blocking;

    #[async_trait]
    impl JobHandler for Blocking {
        type Job = u32;
        type Output = u32;

        async fn handle(&self, _worker_id: usize, job: u32, cancel: &CancellationToken) -> u32 {
            cancel.cancelled().await;
            job
        }
    }

    #[tokio::test]
    async fn cancellation_stops_routing() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(Arc::new(Blocking), 2, 16, cancel.clone());
        let sender = pool.job_sender().unwrap();
        for job in 0..10u32 {
            sender.send(job).await.unwrap();
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
            .await
            .expect("pool should shut down after cancellation");
        assert!(sender.send(99).await.is_err());
    }
}
