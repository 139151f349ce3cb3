//! Worker scheduler
//!
//! One OS thread per worker. Each thread loops: run one update, then sleep
//! for the worker's interval. The interval is a target period: an update
//! that overruns is followed by a full sleep, never a catch-up burst.
//!
//! Errors returned from an update and panics inside it are logged and
//! counted; the loop keeps its cadence. Sleep is sliced into steps of at
//! most one second so [`Scheduler::shutdown`] returns promptly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::store::Store;

/// Longest uninterrupted sleep between stop-flag checks
pub const SLEEP_STEP: Duration = Duration::from_secs(1);

/// One polling operation against the store
pub trait Update: Send + 'static {
    fn update(&mut self, store: &Store) -> Result<()>;
}

impl<F> Update for F
where
    F: FnMut(&Store) -> Result<()> + Send + 'static,
{
    fn update(&mut self, store: &Store) -> Result<()> {
        self(store)
    }
}

/// Per-worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub runs: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    runs: AtomicU64,
    failures: AtomicU64,
}

/// Handle to a spawned worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    interval: Duration,
    counters: Arc<Counters>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            runs: self.counters.runs.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

/// Owns the worker threads and their shared stop flag
pub struct Scheduler {
    store: Arc<Store>,
    running: Arc<AtomicBool>,
    workers: Vec<WorkerHandle>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            running: Arc::new(AtomicBool::new(true)),
            workers: Vec::new(),
        }
    }

    /// Start a named worker; the first update runs immediately
    pub fn spawn<U: Update>(&mut self, name: &str, interval: Duration, update: U) -> Result<()> {
        let counters = Arc::new(Counters::default());
        let ctx = WorkerLoop {
            name: name.to_string(),
            interval,
            store: Arc::clone(&self.store),
            running: Arc::clone(&self.running),
            counters: Arc::clone(&counters),
        };

        let thread = thread::Builder::new()
            .name(format!("worker-{name}"))
            .spawn(move || ctx.run(update))
            .with_context(|| format!("Failed to spawn worker thread: {name}"))?;

        info!("Started worker {} (every {:?})", name, interval);
        self.workers.push(WorkerHandle {
            name: name.to_string(),
            interval,
            counters,
            thread: Some(thread),
        });
        Ok(())
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Counters for the named worker
    pub fn stats(&self, name: &str) -> Option<WorkerStats> {
        self.workers.iter().find(|w| w.name == name).map(WorkerHandle::stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal every worker to stop and join them
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let mut joined = 0;
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!("Worker {} exited abnormally", worker.name);
                }
                joined += 1;
            }
        }
        if joined > 0 {
            info!("Stopped {} workers", joined);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerLoop {
    name: String,
    interval: Duration,
    store: Arc<Store>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl WorkerLoop {
    fn run<U: Update>(self, mut update: U) {
        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| update.update(&self.store)));
            self.counters.runs.fetch_add(1, Ordering::Relaxed);

            match outcome {
                Ok(Ok(())) => debug!("{} updated in {:?}", self.name, started.elapsed()),
                Ok(Err(e)) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    error!("{} update failed: {:#}", self.name, e);
                }
                Err(payload) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    error!("{} update panicked: {}", self.name, panic_message(&*payload));
                }
            }

            self.sleep_interval();
        }
        debug!("{} stopped", self.name);
    }

    fn sleep_interval(&self) {
        let deadline = Instant::now() + self.interval;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_STEP));
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_worker_writes_store() {
        let store = Arc::new(Store::new());
        let mut scheduler = Scheduler::new(Arc::clone(&store));
        scheduler
            .spawn("writer", Duration::from_millis(10), |s: &Store| -> Result<()> {
                s.set("hello", json!("world"));
                Ok(())
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(5), || store.contains("hello")));
        scheduler.shutdown();
        assert_eq!(store.get_str("hello", ""), "world");
    }

    #[test]
    fn test_failing_worker_keeps_cadence() {
        let interval = Duration::from_millis(50);
        let store = Arc::new(Store::new());
        let mut scheduler = Scheduler::new(Arc::clone(&store));
        let started = Instant::now();
        scheduler
            .spawn("failing", interval, |_: &Store| -> Result<()> {
                anyhow::bail!("source down")
            })
            .unwrap();
        scheduler
            .spawn("panicking", interval, |_: &Store| -> Result<()> { panic!("boom") })
            .unwrap();
        let mut n = 0u64;
        scheduler
            .spawn("healthy", interval, move |s: &Store| -> Result<()> {
                n += 1;
                s.set("n", json!(n));
                Ok(())
            })
            .unwrap();

        thread::sleep(Duration::from_millis(275));
        // one run at start, then one per interval: at least floor(T / interval)
        let elapsed = started.elapsed();
        let expected = (elapsed.as_millis() / interval.as_millis()) as u64;
        for name in ["failing", "panicking", "healthy"] {
            let runs = scheduler.stats(name).unwrap().runs;
            assert!(runs >= expected, "{name}: {runs} runs in {elapsed:?}");
            assert!(runs <= expected + 2, "{name}: {runs} runs in {elapsed:?}");
        }
        scheduler.shutdown();

        let failing = scheduler.stats("failing").unwrap();
        assert_eq!(failing.failures, failing.runs);
        let panicking = scheduler.stats("panicking").unwrap();
        assert_eq!(panicking.failures, panicking.runs);
        let healthy = scheduler.stats("healthy").unwrap();
        assert_eq!(healthy.failures, 0);
        assert_eq!(store.get_f64("n", 0.0) as u64, healthy.runs);
    }

    #[test]
    fn test_shutdown_interrupts_long_sleep() {
        let store = Arc::new(Store::new());
        let mut scheduler = Scheduler::new(store);
        scheduler
            .spawn("slow", Duration::from_secs(3600), |_: &Store| -> Result<()> { Ok(()) })
            .unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            scheduler.stats("slow").map_or(false, |s| s.runs == 1)
        }));

        let started = Instant::now();
        scheduler.shutdown();
        assert!(started.elapsed() < SLEEP_STEP * 3);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.stats("slow").unwrap().runs, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }
}
