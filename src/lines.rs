//! # Line Reconstruction
//!
//! Recovers logical lines from terminal-style output that redraws its
//! progress indicator with backspaces instead of newlines.
//!
//! A snapshot of the current line is taken at every newline and at the
//! first backspace of each erase burst. Later backspaces in the same burst
//! only erase. A trailing partial line at end of input is dropped.

use std::io::{ErrorKind, Read};

use memchr::memchr2;
use tracing::warn;

/// Matches the scanner's terminal width; a redraw rarely spans two reads.
pub const READ_BUFFER_SIZE: usize = 80;

const NEWLINE: u8 = b'\n';
const BACKSPACE: u8 = 0x08;

/// Iterator over the logical lines of a byte stream.
pub struct LineReader<R> {
    reader: R,
    buffer: Box<[u8]>,
    pos: usize,
    filled: usize,
    line: Vec<u8>,
    fresh_run: bool,
    done: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
            line: Vec::new(),
            fresh_run: true,
            done: false,
        }
    }

    /// Refill the read buffer. Returns false once the stream is exhausted.
    fn fill(&mut self) -> bool {
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(0) => return false,
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return true;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("scanner output read error: {err}");
                    return false;
                }
            }
        }
    }

    /// Consume buffered bytes until a line is ready or the buffer is empty.
    fn step(&mut self) -> Option<Vec<u8>> {
        while self.pos < self.filled {
            let pending = &self.buffer[self.pos..self.filled];
            let Some(idx) = memchr2(NEWLINE, BACKSPACE, pending) else {
                self.line.extend_from_slice(pending);
                self.fresh_run = true;
                self.pos = self.filled;
                return None;
            };

            if idx > 0 {
                self.line.extend_from_slice(&pending[..idx]);
                self.fresh_run = true;
            }
            let sentinel = pending[idx];
            self.pos += idx + 1;

            if sentinel == NEWLINE {
                self.fresh_run = true;
                return Some(std::mem::take(&mut self.line));
            }

            let snapshot = if self.fresh_run {
                self.fresh_run = false;
                Some(self.line.clone())
            } else {
                None
            };
            self.line.pop();
            if snapshot.is_some() {
                return snapshot;
            }
        }
        None
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            if let Some(line) = self.step() {
                return Some(line);
            }
            if self.done {
                return None;
            }
            if !self.fill() {
                self.done = true;
                self.line.clear();
                return None;
            }
        }
    }
}

/// Reconstruct all lines of an in-memory buffer.
pub fn split_lines(bytes: &[u8]) -> Vec<Vec<u8>> {
    LineReader::new(bytes).collect()
}
