use crate::error::Result;
use crate::types::{AnalysisReport, MetricValue, PairResult, ResultMarker};
use std::fmt::Write;

/// Number of skipped or errored pairs listed before the summary collapses them.
const MAX_LISTED_PAIRS: usize = 20;

/// Renders an [`AnalysisReport`] for humans or machines.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Pretty-printed JSON of the full report.
    pub fn to_json(report: &AnalysisReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Parse a report previously produced by [`ReportGenerator::to_json`].
    pub fn from_json(json: &str) -> Result<AnalysisReport> {
        Ok(serde_json::from_str(json)?)
    }

    /// Plain-text console summary.
    pub fn summary_text(report: &AnalysisReport) -> String {
        let mut out = String::new();
        let meta = &report.metadata;

        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "Combinations analysis: {} rows ({} analyzed), {} columns ({} analyzed)",
            meta.total_rows, meta.analyzed_rows, meta.total_columns, meta.analyzed_columns
        );
        let _ = writeln!(
            out,
            "Pairs: {} considered, {} analyzed, {} skipped, {} errored{}",
            meta.pairs_considered,
            meta.pairs_analyzed,
            meta.skipped_pair_count,
            meta.errored_pair_count,
            if meta.cache_hit { " (cached)" } else { "" }
        );
        let mode = if meta.parallel { "parallel" } else { "sequential" };
        let _ = write!(
            out,
            "Elapsed: {:.1} ms, {} worker(s), {}",
            meta.performance.elapsed_ms, meta.workers, mode
        );
        if let Some(peak) = meta.performance.peak_memory_bytes {
            let _ = write!(out, ", peak memory {:.1} MiB", peak as f64 / (1024.0 * 1024.0));
        }
        out.push('\n');
        if let Some(memory) = &meta.memory {
            let _ = writeln!(
                out,
                "Memory: {} -> {} bytes ({:.1}% saved, {} column(s) narrowed)",
                memory.bytes_before,
                memory.bytes_after,
                memory.savings_ratio() * 100.0,
                memory.optimized_columns.len()
            );
        }

        out.push_str("\nTop relationships:\n");
        if report.results.is_empty() {
            out.push_str("  (none)\n");
        }
        for (rank, result) in report.results.iter().enumerate() {
            let _ = writeln!(out, "  {:>2}. {}", rank + 1, result_line(result));
        }

        if !report.kind_summaries.is_empty() {
            out.push_str("\nBy analysis kind:\n");
            for summary in &report.kind_summaries {
                let _ = writeln!(
                    out,
                    "  {:<12} pairs={} valid={} significant={} max={:.3} mean={:.3}",
                    summary.kind.as_str(),
                    summary.total_pairs,
                    summary.valid_results,
                    summary.significant_results,
                    summary.max_score,
                    summary.mean_score
                );
            }
        }

        if !report.text_profiles.is_empty() {
            out.push_str("\nText columns:\n");
            for profile in &report.text_profiles {
                let _ = writeln!(
                    out,
                    "  {}: avg length {}, {} unique tokens",
                    profile.column_a,
                    format_metric(profile.metrics.get("avg_length")),
                    format_metric(profile.metrics.get("unique_tokens"))
                );
            }
        }

        if !report.skipped_columns.is_empty() {
            out.push_str("\nSkipped columns:\n");
            for column in &report.skipped_columns {
                let _ = writeln!(
                    out,
                    "  {} ({}): {}",
                    column.name,
                    column.semantic_type.as_str(),
                    column.reason
                );
            }
        }

        for (title, pairs) in [
            ("Skipped pairs", &report.skipped_pairs),
            ("Errored pairs", &report.errored_pairs),
        ] {
            if pairs.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{title}:");
            for pair in pairs.iter().take(MAX_LISTED_PAIRS) {
                let _ = writeln!(
                    out,
                    "  {} × {} [{}]: {}",
                    pair.column_a,
                    pair.column_b,
                    pair.marker.code(),
                    marker_reason(&pair.marker)
                );
            }
            if pairs.len() > MAX_LISTED_PAIRS {
                let _ = writeln!(out, "  ... and {} more", pairs.len() - MAX_LISTED_PAIRS);
            }
        }

        out
    }
}

fn result_line(result: &PairResult) -> String {
    let primary = result.primary_metric.as_deref().unwrap_or("-");
    let mut line = format!(
        "{}  [{}]  {}={}  score={:.3}",
        result.pair_label(),
        result.kind.as_str(),
        primary,
        format_metric(result.primary_metric.as_ref().and_then(|m| result.metrics.get(m))),
        result.score
    );
    if let Some(p) = result.metric("p_value") {
        let _ = write!(line, "  p={p:.4}");
    }
    if result.significant == Some(true) {
        line.push_str(" *");
    }
    if result.low_reliability {
        line.push_str("  (low reliability)");
    }
    line
}

fn format_metric(value: Option<&MetricValue>) -> String {
    match value {
        Some(MetricValue::Number(n)) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{n:.0}"),
        Some(MetricValue::Number(n)) => format!("{n:.4}"),
        Some(MetricValue::Flag(b)) => b.to_string(),
        Some(MetricValue::Text(s)) => s.clone(),
        None => "-".to_string(),
    }
}

fn marker_reason(marker: &ResultMarker) -> String {
    match marker {
        ResultMarker::Undefined(reason)
        | ResultMarker::InsufficientData(reason)
        | ResultMarker::InsufficientGroups(reason)
        | ResultMarker::BelowThreshold(reason)
        | ResultMarker::ExceedsLimit(reason) => reason.clone(),
        ResultMarker::Failed(error) => error.to_string(),
    }
}
