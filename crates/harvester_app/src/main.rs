mod config;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use engine_logging::{engine_error, engine_warn, LogDestination, LogSettings};
use harvester_engine::CancellationToken;

use crate::config::{JobFile, DEFAULT_JOB_FILE};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("harvester_app: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let job_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_JOB_FILE));
    let job = JobFile::load(&job_path)?;

    let log_settings = LogSettings {
        file_path: job.log_file.clone(),
        ..LogSettings::default()
    };
    if !engine_logging::initialize(LogDestination::Both, &log_settings) {
        eprintln!("harvester_app: logging unavailable");
    }

    let stop = CancellationToken::new();
    let on_interrupt = stop.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        engine_warn!("Interrupt received; finishing in-flight pages before exit");
        eprintln!("harvester_app: stopping, in-flight pages will finish");
        on_interrupt.cancel();
    }) {
        engine_warn!("Failed to install Ctrl-C handler: {}", err);
    }

    let summary = runner::run_job(&job, &stop)?;
    println!(
        "{} groups, {} active, {} failed{}; companies written to {}",
        summary.groups_completed,
        summary.active,
        summary.failed,
        if summary.cancelled { " (stopped)" } else { "" },
        summary.companies_file.display()
    );
    Ok(())
}
