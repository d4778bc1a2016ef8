//! Performance telemetry for a single analysis run.
//!
//! Records wall-clock time per engine stage and per analysis kind, plus the
//! process peak memory when the OS exposes it. Telemetry never fails a run:
//! when peak memory is unavailable only timings are reported.

use crate::types::{AnalysisKind, KindTiming, PerformanceSnapshot, StageTiming};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Stages of an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStage {
    /// Hashing the table and configuration for the cache key
    Fingerprinting,
    /// Row sampling and focus-column selection
    Preparation,
    /// Dtype narrowing of the working copy
    Optimization,
    /// Column classification
    Classification,
    /// Building pair tasks
    Enumeration,
    /// Running pairwise analyzers
    Analysis,
    /// Per-column text profiles
    TextProfiling,
    /// Ranking and report assembly
    Aggregation,
}

impl EngineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fingerprinting => "Fingerprinting",
            Self::Preparation => "Preparing Table",
            Self::Optimization => "Optimizing Memory",
            Self::Classification => "Classifying Columns",
            Self::Enumeration => "Enumerating Pairs",
            Self::Analysis => "Analyzing Pairs",
            Self::TextProfiling => "Profiling Text",
            Self::Aggregation => "Aggregating Results",
        }
    }
}

#[derive(Debug, Default)]
struct KindAccumulator {
    tasks: usize,
    total: Duration,
}

/// Collects timings for one run. Shared by reference with worker threads.
#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    stages: Mutex<Vec<StageTiming>>,
    per_kind: Mutex<BTreeMap<AnalysisKind, KindAccumulator>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            stages: Mutex::new(Vec::new()),
            per_kind: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run `f` and record its duration under `stage`.
    pub fn track<T>(&self, stage: EngineStage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        debug!(
            stage = stage.display_name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Stage finished"
        );
        self.stages.lock().push(StageTiming {
            stage: format!("{stage:?}").to_lowercase(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        });
        out
    }

    /// Add one analyzer execution to the per-kind totals.
    pub fn record_task(&self, kind: AnalysisKind, elapsed: Duration) {
        let mut per_kind = self.per_kind.lock();
        let entry = per_kind.entry(kind).or_default();
        entry.tasks += 1;
        entry.total += elapsed;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Freeze the collected telemetry.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            elapsed_ms: self.elapsed().as_secs_f64() * 1000.0,
            stages: self.stages.lock().clone(),
            per_kind: self
                .per_kind
                .lock()
                .iter()
                .map(|(kind, acc)| KindTiming {
                    kind: *kind,
                    tasks: acc.tasks,
                    total_ms: acc.total.as_secs_f64() * 1000.0,
                })
                .collect(),
            peak_memory_bytes: peak_memory_bytes(),
        }
    }
}

/// Peak resident set size of the current process.
///
/// `None` when the platform does not expose it.
pub fn peak_memory_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        status
            .lines()
            .find(|line| line.starts_with("VmHWM:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
