//! # Scan Events
//!
//! Diagnostics raised while classifying scanner output.

use std::fmt;

use tracing::{info, warn};

/// Which pattern a line matched, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Start,
    Progress,
    Summary,
    Interrupted,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineKind::Start => "start",
            LineKind::Progress => "progress",
            LineKind::Summary => "summary",
            LineKind::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Progress redraw with completion percentage and elapsed time as printed.
    Progress { percent: f64, elapsed: String },
    /// Pass finished; carries the bad block count.
    Completed { bad_blocks: u64 },
    /// Line matched no known pattern.
    UnknownLine(String),
    /// A numeric field could not be parsed and was left unchanged.
    ParseFailure { field: &'static str, value: String },
    /// Line arrived out of order or out of range and was discarded.
    Inconsistent { kind: LineKind, reason: String },
}

/// Receives events from the classifier thread.
pub trait ProgressReporter: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// Reports events through `tracing`.
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn on_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::Progress { percent, elapsed } => {
                info!("progress: {percent:.2}% ({elapsed} elapsed)");
            }
            ScanEvent::Completed { bad_blocks } => {
                info!("check done, {bad_blocks} bad blocks found");
            }
            ScanEvent::UnknownLine(line) => warn!("ignoring unknown line: '{line}'"),
            ScanEvent::ParseFailure { field, value } => {
                warn!("cannot parse {field} from '{value}', keeping previous value");
            }
            ScanEvent::Inconsistent { kind, reason } => {
                warn!("discarding {kind} line: {reason}");
            }
        }
    }
}
