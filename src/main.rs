use clap::Parser;
use rf_sweeper::args::{convert_filter, Args};
use rf_sweeper::config::RunDescription;
use rf_sweeper::hardware::SimRadio;
use rf_sweeper::run::Runner;
use rf_sweeper::{Result, SweepError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    if let Err(e) = run(&args) {
        error!(%e, "run aborted");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut desc = RunDescription::load(&args.config)?;
    if let Some(output) = &args.output {
        desc.general.output_dir = output.clone();
    }

    let radio = Arc::new(SimRadio::new());
    let runner = Runner::new(desc, radio.clone(), radio);

    // In transmit-only mode Ctrl-C stops the current iteration rather than
    // killing the process
    let stop = runner.operator_stop();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
        .map_err(|e| SweepError::Configuration(format!("could not install Ctrl-C handler: {e}")))?;

    let summary = runner.run()?;
    info!(
        variations = summary.variations,
        failed = summary.failed_variations,
        total_rx_mb = summary.total_rx_bytes as f64 / 1e6,
        elapsed_s = summary.elapsed.as_secs_f64(),
        "run complete"
    );
    Ok(())
}
