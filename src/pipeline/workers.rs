//! # Pipeline Workers
//!
//! Thread spawning for the reader, classifier and signal relay.

use std::io::Read;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, select};
use tracing::{debug, warn};

use crate::classify::Classifier;
use crate::lines::LineReader;
use crate::state::ScanState;

use super::events::ProgressReporter;

/// Spawn the thread reconstructing lines from the scanner's stderr.
pub fn spawn_reader<R>(source: R, tx: Sender<Vec<u8>>) -> thread::JoinHandle<u64>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut lines = 0u64;
        for line in LineReader::new(source) {
            if tx.send(line).is_err() {
                warn!("classifier went away, stopping reader");
                break;
            }
            lines += 1;
        }
        debug!("scanner output closed after {lines} lines");
        lines
    })
}

/// Spawn the thread that owns the scan state while lines arrive.
///
/// The final state is handed off on `result` once `rx` is exhausted.
pub fn spawn_classifier(
    classifier: Arc<Classifier>,
    reporter: Arc<dyn ProgressReporter>,
    rx: Receiver<Vec<u8>>,
    result: Sender<Option<ScanState>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut state = None;
        let mut events = Vec::new();
        for line in rx {
            state = classifier.fold(state, &line, &mut events);
            for event in events.drain(..) {
                reporter.on_event(&event);
            }
        }
        if result.send(state).is_err() {
            warn!("supervisor went away before the final scan state was delivered");
        }
    })
}

/// Wait for the classifier's final state; `None` if it died without one.
pub fn final_state(result: &Receiver<Option<ScanState>>) -> Option<ScanState> {
    result.recv().unwrap_or_else(|_| {
        warn!("classifier ended without a final state");
        None
    })
}

/// Spawn the thread relaying operator interrupts to process `pid`.
///
/// Runs until `stop` is disconnected. Callers must keep `pid` from being
/// reaped until this thread has been joined.
pub fn spawn_signal_relay(
    pid: u32,
    interrupts: Receiver<()>,
    stop: Receiver<()>,
) -> thread::JoinHandle<u64> {
    thread::spawn(move || {
        let mut relayed = 0u64;
        loop {
            select! {
                recv(interrupts) -> msg => match msg {
                    Ok(()) => {
                        send_interrupt(pid);
                        relayed += 1;
                    }
                    Err(_) => {
                        // No more interrupts can arrive; just wait to be stopped.
                        let _ = stop.recv();
                        break;
                    }
                },
                recv(stop) -> _ => break,
            }
        }
        relayed
    })
}

#[cfg(unix)]
fn send_interrupt(pid: u32) {
    debug!("relaying interrupt to scanner pid {pid}");
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        warn!(
            "failed to interrupt scanner pid {pid}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn send_interrupt(pid: u32) {
    warn!("interrupt relay is only supported on Unix platforms (pid {pid})");
}
