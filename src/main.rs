use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use checkdisk::{
    checkpoint::CheckpointStore,
    classify::Classifier,
    cli,
    config,
    grammar::Grammar,
    logging,
    pipeline::{Supervisor, events::LogReporter},
};

fn main() -> Result<ExitCode> {
    logging::init_logging();

    let cli_opts = cli::parse();
    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let mut cfg = loaded.config;
    if let Some(path) = cli_opts.checkpoint {
        cfg.checkpoint_path = path;
    }
    if let Some(binary) = cli_opts.badblocks {
        cfg.scanner.binary = binary;
    }

    let store = CheckpointStore::new(&cfg.checkpoint_path);

    if cli_opts.status {
        let entry = store.load_entry(&cli_opts.device);
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        "checkdisk {} device={} checkpoint={} config_hash={}",
        env!("CARGO_PKG_VERSION"),
        cli_opts.device,
        store.path().display(),
        loaded.config_hash
    );

    let grammar = Grammar::compile(&cfg.grammar).context("invalid scanner grammar")?;
    let supervisor = Supervisor::new(&cfg.scanner, Classifier::new(grammar), Arc::new(LogReporter));

    let (int_tx, int_rx) = crossbeam_channel::unbounded();
    ctrlc::set_handler(move || {
        let _ = int_tx.send(());
    })
    .context("failed to install interrupt handler")?;

    let report = supervisor.check(&store, &cli_opts.device, cli_opts.fresh, &int_rx)?;
    if let Err(err) = report.persisted {
        error!("scan results were not persisted: {err}");
        return Ok(ExitCode::FAILURE);
    }

    info!("checkdisk run finished");
    Ok(ExitCode::SUCCESS)
}
