//! # Output Grammar
//!
//! Compiled patterns for the scanner's stderr lines. Wording comes from the
//! `grammar` section of the config so other scanner versions can be matched
//! without code changes; the set of lines and their captures is fixed.

use regex::bytes::{Captures, Regex};
use thiserror::Error;

use crate::config::{self, GrammarConfig};

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("invalid {pattern} pattern: {source}")]
    Regex {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("{pattern} pattern lacks named group '{group}'")]
    MissingGroup {
        pattern: &'static str,
        group: &'static str,
    },
}

/// Raw `(read/write/corruption)` captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFields<'a> {
    pub read: &'a [u8],
    pub write: &'a [u8],
    pub corruption: &'a [u8],
}

/// A line matched against the grammar, with captures still unparsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Start {
        from: &'a [u8],
        to: &'a [u8],
    },
    Progress {
        percent: &'a [u8],
        elapsed: &'a [u8],
        errors: ErrorFields<'a>,
    },
    EmptyProgress,
    Finished,
    Summary {
        bad_blocks: &'a [u8],
        errors: ErrorFields<'a>,
    },
    Interrupted {
        block: &'a [u8],
    },
    Blank,
    Unknown,
}

const ERROR_GROUPS: [&str; 3] = ["read", "write", "corrupt"];

#[derive(Debug, Clone)]
pub struct Grammar {
    start: Regex,
    progress: Regex,
    empty_progress: Regex,
    finished: Regex,
    summary: Regex,
    interrupted: Regex,
}

impl Grammar {
    pub fn compile(cfg: &GrammarConfig) -> Result<Self, GrammarError> {
        Ok(Self {
            start: compile_pattern("start", &cfg.start, &["from", "to"])?,
            progress: compile_pattern(
                "progress",
                &cfg.progress,
                &["percent", "elapsed", "read", "write", "corrupt"],
            )?,
            empty_progress: compile_pattern("empty_progress", &cfg.empty_progress, &[])?,
            finished: compile_pattern("finished", &cfg.finished, &[])?,
            summary: compile_pattern(
                "summary",
                &cfg.summary,
                &["bad_blocks", "read", "write", "corrupt"],
            )?,
            interrupted: compile_pattern("interrupted", &cfg.interrupted, &["block"])?,
        })
    }

    /// Grammar for the wording shipped in the embedded default config.
    pub fn builtin() -> anyhow::Result<Self> {
        let loaded = config::load_config(None)?;
        Ok(Self::compile(&loaded.config.grammar)?)
    }

    /// Match `line` against each pattern in precedence order.
    pub fn match_line<'a>(&self, line: &'a [u8]) -> Line<'a> {
        if let Some(caps) = self.start.captures(line) {
            return Line::Start {
                from: group(&caps, "from"),
                to: group(&caps, "to"),
            };
        }
        if let Some(caps) = self.progress.captures(line) {
            return Line::Progress {
                percent: group(&caps, "percent"),
                elapsed: group(&caps, "elapsed"),
                errors: error_fields(&caps),
            };
        }
        if self.empty_progress.is_match(line) {
            return Line::EmptyProgress;
        }
        if self.finished.is_match(line) {
            return Line::Finished;
        }
        if let Some(caps) = self.summary.captures(line) {
            return Line::Summary {
                bad_blocks: group(&caps, "bad_blocks"),
                errors: error_fields(&caps),
            };
        }
        if let Some(caps) = self.interrupted.captures(line) {
            return Line::Interrupted {
                block: group(&caps, "block"),
            };
        }
        if line.is_empty() {
            return Line::Blank;
        }
        Line::Unknown
    }
}

fn compile_pattern(
    pattern: &'static str,
    source: &str,
    groups: &[&'static str],
) -> Result<Regex, GrammarError> {
    let regex = Regex::new(source).map_err(|source| GrammarError::Regex { pattern, source })?;
    for &group in groups {
        if !regex.capture_names().flatten().any(|name| name == group) {
            return Err(GrammarError::MissingGroup { pattern, group });
        }
    }
    Ok(regex)
}

// A declared group that did not participate yields an empty capture, which
// then fails numeric parsing like any other malformed field.
fn group<'a>(caps: &Captures<'a>, name: &str) -> &'a [u8] {
    caps.name(name).map(|m| m.as_bytes()).unwrap_or_default()
}

fn error_fields<'a>(caps: &Captures<'a>) -> ErrorFields<'a> {
    let [read, write, corruption] = ERROR_GROUPS.map(|name| group(caps, name));
    ErrorFields {
        read,
        write,
        corruption,
    }
}
