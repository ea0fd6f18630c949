//! Parallel execution of independent traces.
//!
//! Large-scale probing runs many connections at once. Each worker thread
//! owns its trace, context, and layer stack outright — the only structure
//! shared across workers is the append-only result collector behind a
//! mutex. No cancellation is threaded through; a stuck worker resolves via
//! its transport timeout like any other connection.

use std::sync::Mutex;

use wringer_core::{Context, LayerStack};

use crate::engine::{TraceExecutor, TraceReport};
use crate::trace::Trace;

/// One trace scheduled for parallel execution.
#[derive(Debug)]
pub struct TraceJob {
    /// Label for reporting
    pub name: String,
    /// The trace to execute
    pub trace: Trace,
}

impl TraceJob {
    /// Create a named job.
    #[must_use]
    pub fn new(name: impl Into<String>, trace: Trace) -> Self {
        Self { name: name.into(), trace }
    }
}

/// A finished job: the executed trace plus its report.
#[derive(Debug)]
pub struct JobResult {
    /// Job label
    pub name: String,
    /// The trace, now carrying recorded outcomes
    pub trace: Trace,
    /// The engine's report
    pub report: TraceReport,
}

/// Execute all jobs on worker threads, one connection each.
///
/// `setup` builds each worker's private context and stack; it runs on the
/// worker thread. Results come back in job order regardless of completion
/// order.
pub fn run_parallel<F>(jobs: Vec<TraceJob>, setup: F) -> Vec<JobResult>
where
    F: Fn(usize, &TraceJob) -> (Context, LayerStack) + Sync,
{
    let collected: Mutex<Vec<(usize, JobResult)>> = Mutex::new(Vec::new());
    let setup = &setup;
    let collected_ref = &collected;

    std::thread::scope(|scope| {
        for (index, mut job) in jobs.into_iter().enumerate() {
            scope.spawn(move || {
                let (mut ctx, mut stack) = setup(index, &job);
                let report = TraceExecutor::new().execute(&mut job.trace, &mut ctx, &mut stack);
                tracing::debug!(name = %job.name, status = ?report.status, "trace finished");

                let result = JobResult { name: job.name, trace: job.trace, report };
                if let Ok(mut guard) = collected_ref.lock() {
                    guard.push((index, result));
                }
            });
        }
    });

    let mut results = collected.into_inner().unwrap_or_default();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
