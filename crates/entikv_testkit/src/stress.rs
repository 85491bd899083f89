//! Concurrency stress helpers.
//!
//! These run many saves against one server from several threads, each with
//! its own connection, and report how many committed and how many hit a
//! conflict or a uniqueness violation.

use entikv_core::{CoreError, Database, Entity, Schema};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone, Default)]
pub struct StressTestResult {
    /// Saves that committed.
    pub committed: usize,
    /// Saves discarded because a watched key changed.
    pub conflicts: usize,
    /// Saves rejected because a unique value was taken.
    pub violations: usize,
    /// Any other failure.
    pub failed: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Total attempted saves.
    pub fn total(&self) -> usize {
        self.committed + self.conflicts + self.violations + self.failed
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Attempts: {}", self.total());
        println!("Committed: {}", self.committed);
        println!("Conflicts: {}", self.conflicts);
        println!("Violations: {}", self.violations);
        println!("Failed: {}", self.failed);
        println!("Duration: {:?}", self.duration);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Saves per thread.
    pub saves_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            saves_per_thread: 50,
        }
    }
}

#[derive(Default)]
struct Tally {
    committed: AtomicUsize,
    conflicts: AtomicUsize,
    violations: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn record(&self, outcome: Result<(), CoreError>) {
        let slot = match outcome {
            Ok(()) => &self.committed,
            Err(CoreError::Conflict { .. }) => &self.conflicts,
            Err(CoreError::UniqueIndexViolation { .. }) => &self.violations,
            Err(_) => &self.failed,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(self, duration: Duration) -> StressTestResult {
        StressTestResult {
            committed: self.committed.into_inner(),
            conflicts: self.conflicts.into_inner(),
            violations: self.violations.into_inner(),
            failed: self.failed.into_inner(),
            duration,
        }
    }
}

/// Every thread creates instances whose attributes come from `row(thread,
/// i)`. Used to race saves on a shared unique value.
pub fn stress_concurrent_creates<F>(
    db: &Database,
    schema: &Arc<Schema>,
    config: &StressConfig,
    row: F,
) -> StressTestResult
where
    F: Fn(usize, usize) -> Vec<(String, String)> + Sync,
{
    let tally = Tally::default();
    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let (tally, row) = (&tally, &row);
            scope.spawn(move || {
                for i in 0..config.saves_per_thread {
                    let outcome = Entity::create(db, Arc::clone(schema), row(t, i)).map(|_| ());
                    tally.record(outcome);
                }
            });
        }
    });
    tally.finish(start.elapsed())
}

/// Every thread repeatedly updates the same instance, alternating
/// attribute values.
pub fn stress_concurrent_updates(
    db: &Database,
    target: &Entity,
    attribute: &str,
    config: &StressConfig,
) -> StressTestResult {
    let tally = Tally::default();
    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let tally = &tally;
            let mut entity = target.clone();
            scope.spawn(move || {
                for i in 0..config.saves_per_thread {
                    let outcome = entity.update(db, [(attribute, format!("t{t}-{i}"))]);
                    tally.record(outcome);
                }
            });
        }
    });
    tally.finish(start.elapsed())
}
