//! Worker Pool
//!
//! A bounded FIFO of accepted jobs drained by a fixed set of worker threads.
//!
//! ## Lifecycle
//! - `submit` waits at most `submit_timeout` for queue space, then rejects;
//!   it also rejects as soon as shutdown begins
//! - each job runs through the handler, then `Job::cleanup` runs no matter
//!   how the handler ended (error or panic)
//! - `shutdown` stops intake, cleans up queued jobs without running them,
//!   and joins the workers once in-flight jobs have finished

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Select, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{Result, SydbError};

/// Work item accepted by the pool
pub trait Job: Send + 'static {
    /// Release resources held by the job (close sockets etc.)
    fn cleanup(self);
}

/// A job the pool refused, handed back so the caller can answer and clean up
pub struct Rejected<J> {
    pub job: J,
    pub error: SydbError,
}

impl<J> std::fmt::Debug for Rejected<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

type Handler<J> = dyn Fn(&mut J) -> Result<()> + Send + Sync;

/// Live pool counters, shareable with observers that outlive a borrow of the pool
#[derive(Debug)]
pub struct WorkerGauge {
    workers: usize,
    capacity: usize,
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of a [`WorkerGauge`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub workers: usize,
    pub capacity: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: u64,
    /// Jobs whose handler returned an error or panicked
    pub failed: u64,
    pub rejected: u64,
}

impl WorkerGauge {
    fn new(workers: usize, capacity: usize) -> Self {
        Self {
            workers,
            capacity,
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            workers: self.workers,
            capacity: self.capacity,
            queued: self.queued.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size thread pool with a bounded queue
pub struct WorkerPool<J: Job> {
    sender: Sender<J>,
    /// Kept for draining on shutdown and for queue depth
    receiver: Receiver<J>,
    /// Dropping this sender wakes every worker blocked in `select!`
    stop: Mutex<Option<Sender<()>>>,
    /// Disconnects on shutdown so waiting submitters wake too
    stop_signal: Receiver<()>,
    /// Held shared around each enqueue attempt, exclusively to begin shutdown
    intake: RwLock<()>,
    shutting_down: Arc<AtomicBool>,
    gauge: Arc<WorkerGauge>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    submit_timeout: Duration,
}

impl<J: Job> WorkerPool<J> {
    /// Start `worker_count` workers sharing a queue of `capacity` jobs
    pub fn new<F>(
        worker_count: usize,
        capacity: usize,
        submit_timeout: Duration,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(&mut J) -> Result<()> + Send + Sync + 'static,
    {
        let capacity = capacity.max(1);
        let (sender, receiver) = channel::bounded::<J>(capacity);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let worker_count = worker_count.max(1);
        let gauge = Arc::new(WorkerGauge::new(worker_count, capacity));
        let handler: Arc<Handler<J>> = Arc::new(handler);

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let tasks = receiver.clone();
            let stop = stop_rx.clone();
            let handler = Arc::clone(&handler);
            let shutting_down = Arc::clone(&shutting_down);
            let gauge = Arc::clone(&gauge);

            let handle = thread::Builder::new()
                .name(format!("sydb-worker-{}", id))
                .spawn(move || worker_loop(id, tasks, stop, handler, shutting_down, gauge))?;
            workers.push(handle);
        }

        tracing::debug!(
            "Worker pool started: {} workers, queue capacity {}",
            workers.len(),
            capacity
        );

        Ok(Self {
            sender,
            receiver,
            stop: Mutex::new(Some(stop_tx)),
            stop_signal: stop_rx,
            intake: RwLock::new(()),
            shutting_down,
            gauge,
            workers: Mutex::new(workers),
            capacity,
            submit_timeout,
        })
    }

    /// Enqueue a job, waiting up to the submit timeout for room.
    ///
    /// Fails once shutdown has begun, including for callers already
    /// waiting on a full queue.
    pub fn submit(&self, job: J) -> std::result::Result<(), Rejected<J>> {
        let deadline = Instant::now() + self.submit_timeout;
        let mut job = job;

        loop {
            {
                let _intake = self.intake.read();
                if self.is_shutting_down() {
                    return Err(self.reject(job, "worker pool is shutting down".to_string()));
                }
                self.gauge.queued.fetch_add(1, Ordering::SeqCst);
                match self.sender.try_send(job) {
                    Ok(()) => return Ok(()),
                    Err(TrySendError::Full(returned)) => {
                        self.gauge.dequeued();
                        job = returned;
                    }
                    Err(TrySendError::Disconnected(returned)) => {
                        self.gauge.dequeued();
                        return Err(
                            self.reject(returned, "worker pool is shutting down".to_string())
                        );
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.reject(
                    job,
                    format!("request queue full ({} pending)", self.capacity),
                ));
            }

            // Wake on queue space or on shutdown, whichever comes first
            let mut select = Select::new();
            select.send(&self.sender);
            select.recv(&self.stop_signal);
            let _ = select.ready_timeout(deadline - now);
        }
    }

    fn reject(&self, job: J, message: String) -> Rejected<J> {
        self.gauge.rejected.fetch_add(1, Ordering::Relaxed);
        Rejected {
            job,
            error: SydbError::Overloaded(message),
        }
    }

    /// Stop accepting work, drop queued jobs, wait for in-flight ones.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        {
            let _intake = self.intake.write();
            if self.shutting_down.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        tracing::info!("Worker pool shutting down");

        // Wake workers parked on an empty queue
        self.stop.lock().take();

        let mut dropped = 0usize;
        for job in self.receiver.try_iter() {
            self.gauge.dequeued();
            job.cleanup();
            dropped += 1;
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked outside a job");
            }
        }

        // Jobs queued ahead of shutdown that no worker picked up
        for job in self.receiver.try_iter() {
            self.gauge.dequeued();
            job.cleanup();
            dropped += 1;
        }

        tracing::info!("Worker pool stopped ({} queued jobs dropped)", dropped);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a worker
    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    /// Jobs currently inside the handler
    pub fn active(&self) -> usize {
        self.gauge.active.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn gauge(&self) -> Arc<WorkerGauge> {
        Arc::clone(&self.gauge)
    }

    pub fn stats(&self) -> WorkerStats {
        self.gauge.snapshot()
    }
}

impl<J: Job> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<J: Job>(
    id: usize,
    tasks: Receiver<J>,
    stop: Receiver<()>,
    handler: Arc<Handler<J>>,
    shutting_down: Arc<AtomicBool>,
    gauge: Arc<WorkerGauge>,
) {
    loop {
        let next = channel::select! {
            recv(tasks) -> msg => msg.ok(),
            recv(stop) -> _ => None,
        };
        let Some(mut job) = next else {
            break;
        };
        gauge.dequeued();

        // Lost the race with shutdown: drop without running
        if shutting_down.load(Ordering::SeqCst) {
            job.cleanup();
            break;
        }

        gauge.active.fetch_add(1, Ordering::SeqCst);
        match catch_unwind(AssertUnwindSafe(|| handler(&mut job))) {
            Ok(Ok(())) => {
                gauge.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                gauge.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Worker {}: job failed: {}", id, e);
            }
            Err(_) => {
                gauge.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Worker {}: job handler panicked", id);
            }
        }
        job.cleanup();
        gauge.active.fetch_sub(1, Ordering::SeqCst);
    }

    tracing::trace!("Worker {} exiting", id);
}
