//! # Output Classification
//!
//! Folds reconstructed scanner lines into a [`ScanState`]. The fold is pure:
//! [`Classifier::fold`] takes the accumulator by value and returns the next
//! one, pushing any diagnostics into the caller's event buffer. Nothing here
//! fails; malformed or unexpected lines only produce events.

use crate::grammar::{ErrorFields, Grammar, Line};
use crate::pipeline::events::{LineKind, ScanEvent};
use crate::state::{ErrorCounts, ScanState};

pub struct Classifier {
    grammar: Grammar,
}

impl Classifier {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn fold(
        &self,
        state: Option<ScanState>,
        line: &[u8],
        events: &mut Vec<ScanEvent>,
    ) -> Option<ScanState> {
        match self.grammar.match_line(line) {
            Line::Start { from, to } => {
                let prev = state.unwrap_or_else(|| ScanState::started(0, 0));
                let from = parse_u64("from", from, prev.from, events);
                let to = parse_u64("to", to, prev.to, events);
                if from > to {
                    events.push(ScanEvent::Inconsistent {
                        kind: LineKind::Start,
                        reason: format!("range start {from} is past its end {to}"),
                    });
                    return state;
                }
                Some(ScanState::started(from, to))
            }
            Line::Progress {
                percent,
                elapsed,
                errors,
            } => {
                let Some(mut current) = require(state, LineKind::Progress, events) else {
                    return None;
                };
                current.errors = parse_errors(errors, current.errors, events);
                match parse_field::<f64>(percent) {
                    Some(percent) => events.push(ScanEvent::Progress {
                        percent,
                        elapsed: String::from_utf8_lossy(elapsed).into_owned(),
                    }),
                    None => parse_failed("percent", percent, events),
                }
                Some(current)
            }
            Line::EmptyProgress | Line::Finished | Line::Blank => state,
            Line::Summary { bad_blocks, errors } => {
                let Some(mut current) = require(state, LineKind::Summary, events) else {
                    return None;
                };
                current.errors = parse_errors(errors, current.errors, events);
                match parse_field::<u64>(bad_blocks) {
                    Some(bad_blocks) => events.push(ScanEvent::Completed { bad_blocks }),
                    None => parse_failed("bad_blocks", bad_blocks, events),
                }
                Some(current)
            }
            Line::Interrupted { block } => {
                let Some(mut current) = require(state, LineKind::Interrupted, events) else {
                    return None;
                };
                let Some(block) = parse_field::<u64>(block) else {
                    parse_failed("block", block, events);
                    return Some(current);
                };
                if !current.contains(block) {
                    events.push(ScanEvent::Inconsistent {
                        kind: LineKind::Interrupted,
                        reason: format!(
                            "block {block} outside scanned range {}..{}",
                            current.from, current.to
                        ),
                    });
                    return Some(current);
                }
                current.interrupt_block = Some(block);
                Some(current)
            }
            Line::Unknown => {
                events.push(ScanEvent::UnknownLine(
                    String::from_utf8_lossy(line).into_owned(),
                ));
                state
            }
        }
    }

    /// Fold every line of `lines`, starting from no state.
    pub fn fold_all<I>(&self, lines: I, events: &mut Vec<ScanEvent>) -> Option<ScanState>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        lines
            .into_iter()
            .fold(None, |state, line| self.fold(state, line.as_ref(), events))
    }
}

fn require(
    state: Option<ScanState>,
    kind: LineKind,
    events: &mut Vec<ScanEvent>,
) -> Option<ScanState> {
    if state.is_none() {
        events.push(ScanEvent::Inconsistent {
            kind,
            reason: "no start line seen yet".to_string(),
        });
    }
    state
}

fn parse_field<T: std::str::FromStr>(raw: &[u8]) -> Option<T> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn parse_failed(field: &'static str, raw: &[u8], events: &mut Vec<ScanEvent>) {
    events.push(ScanEvent::ParseFailure {
        field,
        value: String::from_utf8_lossy(raw).into_owned(),
    });
}

fn parse_u64(field: &'static str, raw: &[u8], previous: u64, events: &mut Vec<ScanEvent>) -> u64 {
    parse_field(raw).unwrap_or_else(|| {
        parse_failed(field, raw, events);
        previous
    })
}

fn parse_errors(
    fields: ErrorFields<'_>,
    previous: ErrorCounts,
    events: &mut Vec<ScanEvent>,
) -> ErrorCounts {
    ErrorCounts {
        read: parse_u64("read errors", fields.read, previous.read, events),
        write: parse_u64("write errors", fields.write, previous.write, events),
        corruption: parse_u64(
            "corruption errors",
            fields.corruption,
            previous.corruption,
            events,
        ),
    }
}
