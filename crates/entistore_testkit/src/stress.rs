//! Stress tests for EntiStore.
//!
//! These runs race units of work from several threads on shared entities
//! and check afterwards that no committed update was lost.

use entistore_core::{
    CoreResult, RetryConfig, UnitOfWorkContext, UnitOfWorkFactory, UnitOfWorkPolicy, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Operations whose unit of work completed.
    pub successful_ops: usize,
    /// Operations that gave up.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct counters the threads share.
    pub counters: usize,
    /// Retries per operation on conflict.
    pub max_retries: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            counters: 2,
            max_retries: 50,
        }
    }
}

fn counter_id(i: usize) -> String {
    format!("counter-{i}")
}

/// Creates the counters used by [`stress_concurrent_increments`].
///
/// # Panics
///
/// Panics if the counters cannot be committed.
pub fn create_counters(factory: &UnitOfWorkFactory, config: &StressConfig) {
    let mut uow = factory.new_unit_of_work().expect("Failed to open");
    for i in 0..config.counters {
        uow.new_entity("Counter", Some(&counter_id(i)))
            .expect("Failed to create counter");
    }
    uow.complete().expect("Failed to create counters");
}

/// Increments shared counters from several threads, each increment in
/// its own retried unit of work.
pub fn stress_concurrent_increments(
    factory: &UnitOfWorkFactory,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let policy = UnitOfWorkPolicy::new().with_retry(
        RetryConfig::new(config.max_retries).with_delay_factor(Duration::from_micros(200)),
    );

    let start = Instant::now();
    thread::scope(|s| {
        for t in 0..config.threads {
            let (policy, successful, failed) = (&policy, &successful, &failed);
            s.spawn(move || {
                let mut ctx = UnitOfWorkContext::new();
                for i in 0..config.operations {
                    let id = counter_id((t + i) % config.counters);
                    match policy.run(factory, &mut ctx, |uow| increment(uow, &id)) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

fn increment(uow: &mut entistore_core::UnitOfWork, id: &str) -> CoreResult<()> {
    let counter = uow.get("Counter", id)?;
    let value = counter
        .property("value")
        .and_then(Value::as_integer)
        .unwrap_or(0);
    counter.set_property("value", value + 1)
}

/// Sum of all counter values.
///
/// # Panics
///
/// Panics if a counter cannot be read.
pub fn counter_total(factory: &UnitOfWorkFactory, config: &StressConfig) -> i64 {
    let mut uow = factory.new_unit_of_work().expect("Failed to open");
    (0..config.counters)
        .map(|i| {
            uow.get("Counter", &counter_id(i))
                .expect("Counter should exist")
                .property("value")
                .and_then(Value::as_integer)
                .unwrap_or(0)
        })
        .sum()
}
