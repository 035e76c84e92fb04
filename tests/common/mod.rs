//! Shared test infrastructure for supervisor tests.
//!
//! A fake scanner is a POSIX shell script run through `/bin/sh` in place of
//! badblocks. It records its arguments and then runs the given body, which
//! writes scanner-style output to stderr.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tempfile::TempDir;

use checkdisk::checkpoint::CheckpointStore;
use checkdisk::classify::Classifier;
use checkdisk::config::ScannerConfig;
use checkdisk::grammar::Grammar;
use checkdisk::pipeline::Supervisor;
use checkdisk::pipeline::events::{ProgressReporter, ScanEvent};

pub struct FakeScanner {
    pub dir: TempDir,
    pub script: PathBuf,
    pub args_path: PathBuf,
}

impl FakeScanner {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("badblocks.sh");
        let args_path = dir.path().join("args.txt");
        let source = String::from("#!/bin/sh\nprintf '%s\\n' \"$@\" > '")
            + args_path.to_str().expect("utf8 path")
            + "'\n"
            + body;
        fs::write(&script, source).expect("write script");
        Self {
            dir,
            script,
            args_path,
        }
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            binary: PathBuf::from("/bin/sh"),
            args: vec![
                self.script.to_string_lossy().into_owned(),
                "-sv".to_string(),
            ],
        }
    }

    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(&self.args_path)
            .expect("args recorded")
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn store(&self) -> CheckpointStore {
        CheckpointStore::new(self.dir.path().join("checkdisk.conf"))
    }
}

/// Forwards every event to a channel the test can wait on.
pub struct ChannelReporter(pub Sender<ScanEvent>);

impl ProgressReporter for ChannelReporter {
    fn on_event(&self, event: &ScanEvent) {
        let _ = self.0.send(event.clone());
    }
}

pub fn supervisor(fake: &FakeScanner) -> (Supervisor, Receiver<ScanEvent>) {
    let (tx, rx) = unbounded();
    let grammar = Grammar::builtin().expect("grammar");
    let supervisor = Supervisor::new(
        &fake.scanner_config(),
        Classifier::new(grammar),
        Arc::new(ChannelReporter(tx)),
    );
    (supervisor, rx)
}

/// Shell line printing `text` to stderr followed by a backspace erase burst.
pub fn redraw(text: &str) -> String {
    let escaped = text.replace('%', "%%");
    format!("printf '{}{}' >&2\n", escaped, "\\b".repeat(text.len()))
}

/// Shell line printing `text` to stderr without a newline.
pub fn partial(text: &str) -> String {
    format!("printf '{}' >&2\n", text.replace('%', "%%"))
}

/// Shell line printing `text` and a newline to stderr.
pub fn line(text: &str) -> String {
    format!("printf '{}\\n' >&2\n", text.replace('%', "%%"))
}

pub fn progress(percent: &str, errors: (u64, u64, u64)) -> String {
    format!(
        "Checking for bad blocks (read-only test): {percent}% done, 0:01 elapsed. ({}/{}/{} errors)",
        errors.0, errors.1, errors.2
    )
}
