//! # Scan State
//!
//! The accumulated knowledge of one scan run, built up by the classifier and
//! persisted per device by the checkpoint store.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Error counters reported by the scanner, in its `(read/write/corruption)` order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u64; 3]", into = "[u64; 3]")]
pub struct ErrorCounts {
    pub read: u64,
    pub write: u64,
    pub corruption: u64,
}

impl ErrorCounts {
    pub fn new(read: u64, write: u64, corruption: u64) -> Self {
        Self {
            read,
            write,
            corruption,
        }
    }

    pub fn total(&self) -> u64 {
        self.read
            .saturating_add(self.write)
            .saturating_add(self.corruption)
    }
}

impl From<[u64; 3]> for ErrorCounts {
    fn from(raw: [u64; 3]) -> Self {
        Self::new(raw[0], raw[1], raw[2])
    }
}

impl From<ErrorCounts> for [u64; 3] {
    fn from(counts: ErrorCounts) -> Self {
        [counts.read, counts.write, counts.corruption]
    }
}

impl fmt::Display for ErrorCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.read, self.write, self.corruption)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    /// First block of the scanned range.
    #[serde(alias = "From")]
    pub from: u64,
    /// End of the scanned range, exclusive.
    #[serde(alias = "To")]
    pub to: u64,
    /// Block the scan stopped at; `None` once a run completes uninterrupted.
    #[serde(default, alias = "InterruptBlock")]
    pub interrupt_block: Option<u64>,
    #[serde(default, alias = "Errors")]
    pub errors: ErrorCounts,
}

impl ScanState {
    /// State for a freshly started run over `from..to`.
    pub fn started(from: u64, to: u64) -> Self {
        Self {
            from,
            to,
            interrupt_block: None,
            errors: ErrorCounts::default(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt_block.is_some()
    }

    /// Whether `block` may be recorded as an interruption point of this run.
    ///
    /// badblocks prints its last block inclusively, so an interruption at
    /// exactly `to` is rejected on purpose: the range is half-open and a
    /// resume from `to` would cover nothing.
    pub fn contains(&self, block: u64) -> bool {
        (self.from..self.to).contains(&block)
    }

    /// Remaining range a resumed run has to cover.
    pub fn resume_range(&self) -> Option<Range<u64>> {
        self.interrupt_block.map(|block| block..self.to)
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.total()
    }
}
