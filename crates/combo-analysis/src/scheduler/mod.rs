//! Pair enumeration and task scheduling.
//!
//! Tasks run either on a dedicated rayon pool of `max_workers` threads or
//! sequentially in the calling thread. Both modes use the same per-task
//! function, so only concurrency differs. A failing or panicking task
//! becomes an error-marked [`PairResult`]; it never aborts the batch.

mod enumerator;

pub use enumerator::{Enumeration, PairEnumerator};

use crate::config::AnalysisConfig;
use crate::error::TaskError;
use crate::monitor::PerformanceMonitor;
use crate::types::{PairResult, PairTask};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use tracing::{debug, warn};

/// Dispatches pair tasks to analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    parallel: bool,
    workers: usize,
}

impl Scheduler {
    pub fn new(parallel: bool, workers: usize) -> Self {
        Self {
            parallel,
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.parallel_processing, config.max_workers)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn workers(&self) -> usize {
        if self.parallel { self.workers } else { 1 }
    }

    /// Run every task once and return one result per task, in task order.
    pub fn run<F>(
        &self,
        tasks: &[PairTask],
        analyze: F,
        monitor: &PerformanceMonitor,
    ) -> Vec<PairResult>
    where
        F: Fn(&PairTask) -> Result<PairResult, TaskError> + Sync,
    {
        if !self.parallel || tasks.len() < 2 {
            return Self::run_sequential(tasks, &analyze, monitor);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("combo-worker-{i}"))
            .build();
        match pool {
            Ok(pool) => {
                debug!(workers = self.workers, tasks = tasks.len(), "Running tasks in parallel");
                pool.install(|| {
                    tasks
                        .par_iter()
                        .map(|task| execute_task(task, &analyze, monitor))
                        .collect()
                })
            }
            Err(e) => {
                warn!("Failed to build worker pool, running sequentially: {}", e);
                Self::run_sequential(tasks, &analyze, monitor)
            }
        }
    }

    fn run_sequential<F>(
        tasks: &[PairTask],
        analyze: &F,
        monitor: &PerformanceMonitor,
    ) -> Vec<PairResult>
    where
        F: Fn(&PairTask) -> Result<PairResult, TaskError>,
    {
        tasks
            .iter()
            .map(|task| execute_task(task, analyze, monitor))
            .collect()
    }
}

/// Run one task with panic isolation and timing.
fn execute_task<F>(task: &PairTask, analyze: &F, monitor: &PerformanceMonitor) -> PairResult
where
    F: Fn(&PairTask) -> Result<PairResult, TaskError>,
{
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| analyze(task)));
    monitor.record_task(task.kind.analysis_kind(), start.elapsed());

    let error = match outcome {
        Ok(Ok(result)) => return result,
        Ok(Err(error)) => error,
        Err(payload) => TaskError::Panicked(panic_message(payload.as_ref())),
    };
    warn!(
        column_a = %task.column_a,
        column_b = %task.column_b,
        code = error.error_code(),
        "Pair analysis failed: {}",
        error
    );
    PairResult::failed(task, error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnData, PairKind, ResultMarker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tasks(n: usize) -> Vec<PairTask> {
        (0..n)
            .map(|i| PairTask {
                column_a: format!("a{i}"),
                column_b: format!("b{i}"),
                kind: PairKind::NumericNumeric,
                data_a: ColumnData::numeric(vec![Some(i as f64)]),
                data_b: ColumnData::numeric(vec![Some(1.0)]),
            })
            .collect()
    }

    fn scored(task: &PairTask) -> Result<PairResult, TaskError> {
        let mut result = PairResult::for_task(task);
        result.score = task.column_a[1..].parse::<f64>().unwrap_or_default();
        Ok(result)
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let work = tasks(16);
        let monitor = PerformanceMonitor::new();

        let sequential = Scheduler::new(false, 4).run(&work, scored, &monitor);
        let parallel = Scheduler::new(true, 4).run(&work, scored, &monitor);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 16);
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let work = tasks(6);
        let monitor = PerformanceMonitor::new();
        let analyze = |task: &PairTask| {
            if task.column_a == "a3" {
                panic!("analyzer exploded");
            }
            scored(task)
        };

        for parallel in [false, true] {
            let results = Scheduler::new(parallel, 3).run(&work, analyze, &monitor);
            assert_eq!(results.len(), 6);
            let failed: Vec<_> = results.iter().filter(|r| !r.is_rankable()).collect();
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].column_a, "a3");
            match &failed[0].marker {
                Some(ResultMarker::Failed(TaskError::Panicked(msg))) => {
                    assert!(msg.contains("exploded"))
                }
                other => panic!("unexpected marker {other:?}"),
            }
        }
    }

    #[test]
    fn test_task_error_becomes_failed_result() {
        let work = tasks(2);
        let monitor = PerformanceMonitor::new();
        let results = Scheduler::new(false, 1).run(
            &work,
            |_| Err(TaskError::NonFinite("test".to_string())),
            &monitor,
        );
        assert!(results.iter().all(|r| r.marker.as_ref().is_some_and(ResultMarker::is_error)));
    }

    #[test]
    fn test_every_task_runs_once() {
        let work = tasks(25);
        let monitor = PerformanceMonitor::new();
        let calls = AtomicUsize::new(0);
        Scheduler::new(true, 4).run(
            &work,
            |task| {
                calls.fetch_add(1, Ordering::SeqCst);
                scored(task)
            },
            &monitor,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 25);
        assert_eq!(monitor.snapshot().per_kind[0].tasks, 25);
    }

    #[test]
    fn test_workers_reported() {
        assert_eq!(Scheduler::new(false, 8).workers(), 1);
        assert_eq!(Scheduler::new(true, 0).workers(), 1);
        assert_eq!(Scheduler::new(true, 6).workers(), 6);
    }
}
