//! CLI output formatting for conversion and check runs.
//!
//! # Entity Display Contract
//!
//! Every file follows the same two-level pattern:
//!
//! 1. **Header line**: positional index + label (or the raw file name in
//!    parentheses when the file never converted)
//! 2. **Context lines**: indented `Source:`, `Output:`, `Handle:`, checksum
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! 001 dawn (Quality 90%)
//!     Source: dawn.png • 1.2 MB • image/png • 2000 × 1000
//!     Output: dawn-q90-1024px.webp • 88 KB • image/webp • 1024 × 512
//!     Handle: blob:pixelgate/1
//!     SHA-256: 9f86d081884c7d65...
//! 002 (notes.png) skipped: Unsupported or spoofed format
//!
//! Notices
//!     notes.png skipped (unsupported or spoofed format).
//!
//! Converted 1 of 2 files
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 dawn.png: ok • 1.2 MB • png • 2000 × 1000
//! 002 notes.png: Unsupported or spoofed format • 312 B • unknown
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. `--json` output goes through
//! [`batch_summary`], a serializable view of a [`BatchReport`].

use crate::convert::{BatchReport, FileOutcome, Inspection, Notice};
use crate::handles::ManagedHandle;
use crate::integrity::ChecksumStatus;
use crate::naming::format_bytes;
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Convert output
// ============================================================================

/// Format a batch report as display lines.
///
/// When `out_dir` is given, converted files show where they were saved.
pub fn format_batch_report(report: &BatchReport, out_dir: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let index = format_index(i + 1);
        match outcome {
            FileOutcome::Converted(c) => {
                lines.push(format!("{} {}", index, c.label));
                lines.push(format!(
                    "    Source: {} • {}",
                    c.source_name, c.result.source_descriptor
                ));
                lines.push(format!(
                    "    Output: {} • {}",
                    c.download_file_name, c.converted_descriptor
                ));
                lines.push(format!("    Handle: {}", c.handle));
                if let Some(dir) = out_dir {
                    lines.push(format!(
                        "    Saved: {}",
                        dir.join(&c.download_file_name).display()
                    ));
                }
                lines.push(format!("    {}", c.checksum.status().label()));
            }
            FileOutcome::Skipped(s) => {
                lines.push(format!(
                    "{} ({}) skipped: {}",
                    index,
                    s.name,
                    s.reason.summary()
                ));
            }
        }
    }

    lines.extend(format_notices(&report.notices));

    if !report.unprocessed.is_empty() {
        lines.push(String::new());
        lines.push("Unprocessed".to_string());
        for name in &report.unprocessed {
            lines.push(format!("    {}", name));
        }
    }

    let total = report.outcomes.len() + report.unprocessed.len();
    lines.push(String::new());
    lines.push(format!(
        "Converted {} of {}",
        report.converted().count(),
        plural(total, "file")
    ));

    lines
}

/// Format notices as an indented block, or nothing when there are none.
pub fn format_notices(notices: &[Notice]) -> Vec<String> {
    if notices.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), "Notices".to_string()];
    lines.extend(notices.iter().map(|n| format!("    {}", n.message)));
    lines
}

/// Print a batch report to stdout.
pub fn print_batch_report(report: &BatchReport, out_dir: Option<&Path>) {
    for line in format_batch_report(report, out_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format inspections, one line per file.
pub fn format_check(inspections: &[Inspection]) -> Vec<String> {
    inspections
        .iter()
        .enumerate()
        .map(|(i, inspection)| {
            let facts = format!(
                "{} • {}",
                format_bytes(inspection.byte_len),
                inspection.sniffed
            );
            match &inspection.verdict {
                Ok(dims) => format!(
                    "{} {}: ok • {} • {} × {}",
                    format_index(i + 1),
                    inspection.name,
                    facts,
                    dims.width,
                    dims.height
                ),
                Err(reason) => format!(
                    "{} {}: {} • {}",
                    format_index(i + 1),
                    inspection.name,
                    reason.summary(),
                    facts
                ),
            }
        })
        .collect()
}

pub fn print_check(inspections: &[Inspection]) {
    for line in format_check(inspections) {
        println!("{}", line);
    }
}

// ============================================================================
// JSON summary
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub converted: Vec<ConvertedSummary>,
    pub skipped: Vec<SkippedSummary>,
    pub notices: Vec<Notice>,
    pub unprocessed: Vec<String>,
    pub rate_limited: bool,
}

#[derive(Debug, Serialize)]
pub struct ConvertedSummary {
    pub source: String,
    pub label: String,
    pub download_file_name: String,
    pub handle: ManagedHandle,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    pub bytes: usize,
    pub source_descriptor: String,
    pub converted_descriptor: String,
    pub checksum: ChecksumStatus,
}

#[derive(Debug, Serialize)]
pub struct SkippedSummary {
    pub name: String,
    pub reason: String,
}

/// Serializable snapshot of a report, with checksums as currently observed.
pub fn batch_summary(report: &BatchReport) -> BatchSummary {
    BatchSummary {
        converted: report
            .converted()
            .map(|c| ConvertedSummary {
                source: c.source_name.clone(),
                label: c.label.clone(),
                download_file_name: c.download_file_name.clone(),
                handle: c.handle,
                width: c.result.width,
                height: c.result.height,
                mime: c.result.mime,
                bytes: c.result.bytes.len(),
                source_descriptor: c.result.source_descriptor.clone(),
                converted_descriptor: c.converted_descriptor.clone(),
                checksum: c.checksum.status(),
            })
            .collect(),
        skipped: report
            .skipped()
            .map(|s| SkippedSummary {
                name: s.name.clone(),
                reason: s.reason.summary(),
            })
            .collect(),
        notices: report.notices.clone(),
        unprocessed: report.unprocessed.clone(),
        rate_limited: report.rate_limited,
    }
}
