//! # Pipeline Module
//!
//! Supervises one run of the external scanner: picks a fresh or resumed
//! range from the checkpoint, wires the scanner's stderr through line
//! reconstruction and classification, relays operator interrupts and
//! persists the final state.

pub mod events;
pub mod workers;

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded};
use tracing::{info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::classify::Classifier;
use crate::config::ScannerConfig;
use crate::state::ScanState;

use events::ProgressReporter;

/// Which range the scanner is asked to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPlan {
    /// Whole device.
    Fresh,
    /// Continue an interrupted run over `from..to`.
    Resume { from: u64, to: u64 },
}

impl ScanPlan {
    /// Resume when the stored state records an interruption, otherwise start over.
    pub fn from_checkpoint(prior: Option<&ScanState>) -> Self {
        let Some(state) = prior else {
            return ScanPlan::Fresh;
        };
        match state.resume_range() {
            Some(range) if !range.is_empty() => ScanPlan::Resume {
                from: range.start,
                to: range.end,
            },
            Some(range) => {
                warn!(
                    "stored interruption {}..{} is empty, starting a new check",
                    range.start, range.end
                );
                ScanPlan::Fresh
            }
            None => ScanPlan::Fresh,
        }
    }

    /// Scanner arguments following `base` for `device`.
    ///
    /// A resumed run passes the last block before the first one, matching
    /// badblocks' positional order.
    pub fn args(&self, base: &[String], device: &str) -> Vec<String> {
        let mut args = base.to_vec();
        args.push(device.to_string());
        if let ScanPlan::Resume { from, to } = self {
            args.push(to.to_string());
            args.push(from.to_string());
        }
        args
    }
}

/// Result of one supervised scanner run.
#[derive(Debug)]
pub struct ScanOutcome {
    pub state: Option<ScanState>,
    pub status: ExitStatus,
    pub interrupts_relayed: u64,
}

/// Result of a full check including persistence.
#[derive(Debug)]
pub struct ScanReport {
    pub plan: ScanPlan,
    pub outcome: ScanOutcome,
    pub persisted: Result<(), CheckpointError>,
}

pub struct Supervisor {
    binary: PathBuf,
    base_args: Vec<String>,
    classifier: Arc<Classifier>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Supervisor {
    pub fn new(
        scanner: &ScannerConfig,
        classifier: Classifier,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            binary: scanner.binary.clone(),
            base_args: scanner.args.clone(),
            classifier: Arc::new(classifier),
            reporter,
        }
    }

    pub fn command_args(&self, device: &str, plan: ScanPlan) -> Vec<String> {
        plan.args(&self.base_args, device)
    }

    /// Run the scanner once and return the classified state.
    ///
    /// Only failing to start the scanner is an error; everything after that
    /// drains to a (possibly empty) final state.
    pub fn run(&self, device: &str, plan: ScanPlan, interrupts: &Receiver<()>) -> Result<ScanOutcome> {
        let args = self.command_args(device, plan);
        info!("running {} {}", self.binary.display(), args.join(" "));

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            // Keep the terminal's Ctrl+C away from the scanner; the relay forwards it.
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", self.binary.display()))?;
        let Some(stderr) = child.stderr.take() else {
            abandon(&mut child);
            anyhow::bail!("scanner stderr was not captured");
        };

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let relay = workers::spawn_signal_relay(child.id(), interrupts.clone(), stop_rx);

        let (line_tx, line_rx) = bounded::<Vec<u8>>(0);
        let (state_tx, state_rx) = bounded::<Option<ScanState>>(0);
        let reader = workers::spawn_reader(stderr, line_tx);
        let classify = workers::spawn_classifier(
            Arc::clone(&self.classifier),
            Arc::clone(&self.reporter),
            line_rx,
            state_tx,
        );

        // The child stays unreaped until the relay is joined so its pid
        // cannot be recycled under the relay.
        if let Err(err) = wait_for_exit(&child) {
            warn!("waiting for scanner exit failed: {err}");
        }
        drop(stop_tx);
        let interrupts_relayed = relay.join().unwrap_or_else(|_| {
            warn!("signal relay panicked");
            0
        });

        let state = workers::final_state(&state_rx);
        if reader.join().is_err() {
            warn!("scanner output reader panicked");
        }
        if classify.join().is_err() {
            warn!("classifier panicked");
        }
        let status = reap(&mut child);

        if !status.success() {
            warn!("scanner exited with {status}");
        }
        Ok(ScanOutcome {
            state,
            status,
            interrupts_relayed,
        })
    }

    /// Plan from the checkpoint, run, persist and report.
    pub fn check(
        &self,
        store: &CheckpointStore,
        device: &str,
        force_fresh: bool,
        interrupts: &Receiver<()>,
    ) -> Result<ScanReport> {
        let prior = store.load(device);
        let plan = if force_fresh {
            ScanPlan::Fresh
        } else {
            ScanPlan::from_checkpoint(prior.as_ref())
        };
        match plan {
            ScanPlan::Fresh => info!("starting a new check of {device}"),
            ScanPlan::Resume { from, to } => {
                info!("resuming an earlier check of {device} at block {from} (end {to})")
            }
        }

        let outcome = self.run(device, plan, interrupts)?;
        let persisted = store.save(device, outcome.state.as_ref());
        if let Err(err) = &persisted {
            warn!(
                "failed to write checkpoint {}: {err}",
                store.path().display()
            );
        }
        report_state(device, outcome.state.as_ref());

        Ok(ScanReport {
            plan,
            outcome,
            persisted,
        })
    }
}

fn report_state(device: &str, state: Option<&ScanState>) {
    let Some(state) = state else {
        warn!("scanner reported no start line for {device}; nothing persisted");
        return;
    };
    let errors = state.errors;
    match state.interrupt_block {
        Some(block) => {
            info!("check of {device} has been interrupted at block {block}");
            info!(
                "so far ({}, {}, {}) errors have been found",
                errors.read, errors.write, errors.corruption
            );
        }
        None => info!(
            "check of {device} covered blocks {}..{} with ({}, {}, {}) errors",
            state.from, state.to, errors.read, errors.write, errors.corruption
        ),
    }
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Reap `child`. A failed reap is logged and reported as a failed run so the
/// classified state still reaches the checkpoint.
fn reap(child: &mut Child) -> ExitStatus {
    child.wait().unwrap_or_else(|err| {
        warn!("failed to reap scanner process: {err}");
        failed_status()
    })
}

#[cfg(unix)]
fn failed_status() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

#[cfg(windows)]
fn failed_status() -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(1)
}

/// Block until `child` has exited without reaping it.
#[cfg(unix)]
fn wait_for_exit(child: &Child) -> std::io::Result<()> {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                child.id() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn wait_for_exit(_child: &Child) -> std::io::Result<()> {
    Ok(())
}
