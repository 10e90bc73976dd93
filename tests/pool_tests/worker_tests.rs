//! Tests for the worker pool
//!
//! These tests verify:
//! - Every accepted job runs once and is cleaned up
//! - The queue never grows past its capacity
//! - Submissions fail once shutdown has begun
//! - Shutdown finishes in-flight work and drops queued work
//! - A panicking job does not take its worker down

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use sydb::error::SydbError;
use sydb::pool::{Job, WorkerPool};

// =============================================================================
// Helper Functions
// =============================================================================

struct Task {
    id: usize,
    cleaned: Arc<AtomicUsize>,
}

impl Job for Task {
    fn cleanup(self) {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
    }
}

fn task(id: usize, cleaned: &Arc<AtomicUsize>) -> Task {
    Task {
        id,
        cleaned: Arc::clone(cleaned),
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

// =============================================================================
// Execution Tests
// =============================================================================

#[test]
fn test_all_jobs_run_and_are_cleaned_up() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = channel::unbounded();
    let pool = WorkerPool::new(3, 16, Duration::from_secs(1), move |job: &mut Task| {
        done_tx.send(job.id).unwrap();
        Ok(())
    })
    .unwrap();

    for id in 0..10 {
        pool.submit(task(id, &cleaned)).unwrap();
    }

    let mut seen: Vec<usize> = (0..10)
        .map(|_| done_rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());

    wait_until(|| cleaned.load(Ordering::SeqCst) == 10);
    wait_until(|| pool.stats().completed == 10);
    pool.shutdown();
}

#[test]
fn test_failed_job_is_still_cleaned_up() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let pool = WorkerPool::new(1, 4, Duration::from_secs(1), |_job: &mut Task| {
        Err(SydbError::Validation("nope".to_string()))
    })
    .unwrap();

    pool.submit(task(0, &cleaned)).unwrap();

    wait_until(|| cleaned.load(Ordering::SeqCst) == 1);
    wait_until(|| pool.stats().failed == 1);
}

#[test]
fn test_panicking_job_does_not_kill_worker() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_in_pool = Arc::clone(&ran);
    let pool = WorkerPool::new(1, 4, Duration::from_secs(1), move |job: &mut Task| {
        if job.id == 0 {
            panic!("boom");
        }
        ran_in_pool.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    pool.submit(task(0, &cleaned)).unwrap();
    pool.submit(task(1, &cleaned)).unwrap();

    wait_until(|| cleaned.load(Ordering::SeqCst) == 2);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Backpressure Tests
// =============================================================================

#[test]
fn test_queue_is_bounded() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let (gate_tx, gate_rx) = channel::unbounded::<()>();
    let pool = WorkerPool::new(1, 2, Duration::from_millis(50), move |_job: &mut Task| {
        let _ = gate_rx.recv();
        Ok(())
    })
    .unwrap();

    pool.submit(task(0, &cleaned)).unwrap();
    wait_until(|| pool.active() == 1);

    pool.submit(task(1, &cleaned)).unwrap();
    pool.submit(task(2, &cleaned)).unwrap();
    assert_eq!(pool.queue_len(), 2);

    let rejected = pool.submit(task(3, &cleaned)).unwrap_err();
    assert!(matches!(rejected.error, SydbError::Overloaded(_)));
    assert_eq!(rejected.job.id, 3);
    assert!(pool.queue_len() <= pool.capacity());
    assert_eq!(pool.stats().rejected, 1);

    for _ in 0..3 {
        gate_tx.send(()).unwrap();
    }
    wait_until(|| cleaned.load(Ordering::SeqCst) == 3);
    assert_eq!(pool.stats().queued, 0);
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_submit_after_shutdown_fails() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let pool = WorkerPool::new(2, 4, Duration::from_millis(50), |_job: &mut Task| Ok(())).unwrap();

    pool.shutdown();
    let rejected = pool.submit(task(7, &cleaned)).unwrap_err();

    assert!(pool.is_shutting_down());
    assert!(matches!(rejected.error, SydbError::Overloaded(_)));
    assert_eq!(rejected.job.id, 7);
}

#[test]
fn test_submit_waiting_on_full_queue_fails_at_shutdown() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_in_pool = Arc::clone(&ran);
    let (gate_tx, gate_rx) = channel::unbounded::<()>();
    let pool = Arc::new(
        WorkerPool::new(1, 1, Duration::from_secs(5), move |_job: &mut Task| {
            let _ = gate_rx.recv();
            ran_in_pool.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap(),
    );

    pool.submit(task(0, &cleaned)).unwrap();
    wait_until(|| pool.active() == 1);
    pool.submit(task(1, &cleaned)).unwrap();

    let waiting_pool = Arc::clone(&pool);
    let waiting_cleaned = Arc::clone(&cleaned);
    let waiter = thread::spawn(move || waiting_pool.submit(task(2, &waiting_cleaned)));
    thread::sleep(Duration::from_millis(100));

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let _ = gate_tx.send(());
    });
    let started = Instant::now();
    pool.shutdown();
    opener.join().unwrap();

    let rejected = waiter.join().unwrap().unwrap_err();
    assert_eq!(rejected.job.id, 2);
    assert!(matches!(rejected.error, SydbError::Overloaded(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(cleaned.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().rejected, 1);
}

#[test]
fn test_shutdown_drops_queued_and_finishes_in_flight() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_in_pool = Arc::clone(&ran);
    let (gate_tx, gate_rx) = channel::unbounded::<()>();
    let pool = WorkerPool::new(1, 4, Duration::from_secs(1), move |_job: &mut Task| {
        let _ = gate_rx.recv();
        ran_in_pool.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    pool.submit(task(0, &cleaned)).unwrap();
    wait_until(|| pool.active() == 1);
    pool.submit(task(1, &cleaned)).unwrap();
    pool.submit(task(2, &cleaned)).unwrap();

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let _ = gate_tx.send(());
    });
    pool.shutdown();
    opener.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(cleaned.load(Ordering::SeqCst), 3);
    assert_eq!(pool.active(), 0);
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = WorkerPool::new(2, 4, Duration::from_millis(50), |_job: &mut Task| Ok(())).unwrap();

    pool.shutdown();
    pool.shutdown();

    assert!(pool.is_shutting_down());
}
