//! Result reports: the text listing on stdout and the JSON export file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use framesift_core::models::RankedResult;

/// One hit in a per-segment search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentHit {
    pub rank: usize,
    pub path: String,
    pub score: f32,
    /// Frame time parsed from the file name, if any.
    pub timestamp: Option<f64>,
    /// Whether `timestamp` falls inside the segment's time range.
    pub in_segment: bool,
}

/// Results for one transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub segment: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Corpus frames grouped under this segment by frame time, as relative paths.
    pub frames: Vec<String>,
    pub results: Vec<SegmentHit>,
    /// Status code when the segment was not searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Render the text report for a single query.
pub fn format_results(results: &[RankedResult], top_k: usize) -> String {
    let mut out = format!("# Search results (Top {})\n", top_k);
    if results.is_empty() {
        out.push_str("No results.\n");
        return out;
    }
    for r in results {
        let _ = writeln!(out, "#{}  score: {:.4}  path: {}", r.rank, r.score, r.path);
    }
    out
}

fn format_time(secs: f64) -> String {
    let total_ms = (secs * 1000.0).round() as u64;
    let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, rem / 1000, rem % 1000)
}

/// Render the text report for a per-segment run.
pub fn format_segments(reports: &[SegmentReport], top_k: usize) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(
            out,
            "## Segment {}  [{} ~ {}]",
            report.segment,
            format_time(report.start),
            format_time(report.end)
        );
        let _ = writeln!(out, "frames: {}", report.frames.len());
        if let Some(code) = &report.skipped {
            let _ = writeln!(out, "skipped: {}\n", code);
            continue;
        }
        let _ = writeln!(out, "# Search results (Top {})", top_k);
        for hit in &report.results {
            let marker = if hit.in_segment { "  *" } else { "" };
            let _ = writeln!(
                out,
                "#{}  score: {:.4}  path: {}{}",
                hit.rank, hit.score, hit.path, marker
            );
        }
        out.push('\n');
    }
    out
}

/// Write `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(())
}
