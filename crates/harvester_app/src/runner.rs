use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::Organization;
use harvester_engine::{
    build_companies_export, ensure_output_dir, write_group_status, CancellationToken, EngineEvent,
    EngineHandle, ExportOptions,
};

use crate::config::JobFile;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub groups_completed: usize,
    pub active: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub status_files: Vec<PathBuf>,
    pub companies_file: PathBuf,
}

/// Harvests every group of `job`, writing one status file per completed
/// group and a single companies export at the end.
///
/// Cancelling `stop` lets in-flight pages finish; groups completed up to that
/// point, the interrupted group included, are still written and exported.
pub fn run_job(job: &JobFile, stop: &CancellationToken) -> Result<RunSummary> {
    ensure_output_dir(&job.output_dir)
        .with_context(|| format!("preparing output directory {}", job.output_dir.display()))?;

    let options = ExportOptions::default();
    let groups = job.url_groups();
    engine_info!(
        "Harvesting {} groups into {}",
        groups.len(),
        job.output_dir.display()
    );

    let engine = EngineHandle::start_with_cancel(job.harvest_settings(), groups, stop.clone());
    let mut companies: Vec<(String, Organization)> = Vec::new();
    let mut summary = RunSummary {
        groups_completed: 0,
        active: 0,
        failed: 0,
        cancelled: false,
        status_files: Vec::new(),
        companies_file: PathBuf::new(),
    };
    let mut setup_error = None;

    while let Some(event) = engine.recv() {
        match event {
            EngineEvent::Progress { group, update } => {
                engine_info!("[{}] {}", group, update.message);
            }
            EngineEvent::GroupCompleted { group, result } => {
                let path = write_group_status(&job.output_dir, &group, &result, &options)
                    .with_context(|| format!("writing status for group {group}"))?;
                engine_info!(
                    "Group {} done: {} active, {} failed ({})",
                    group,
                    result.success_count(),
                    result.failure_count(),
                    path.display()
                );
                summary.groups_completed += 1;
                summary.active += result.success_count();
                summary.failed += result.failure_count();
                summary.status_files.push(path);
                companies.extend(
                    result
                        .organizations()
                        .cloned()
                        .map(|org| (group.clone(), org)),
                );
            }
            EngineEvent::Failed { group, error } => {
                engine_error!("Group {} failed: {}", group, error);
                setup_error = Some(error);
            }
            EngineEvent::Finished { cancelled } => {
                summary.cancelled = cancelled;
                break;
            }
        }
    }
    engine.join();

    if summary.cancelled {
        engine_warn!("Harvest was stopped before all groups completed");
    }

    let export = build_companies_export(
        &job.output_dir,
        companies.iter().map(|(group, org)| (group.as_str(), org)),
        &options,
    )
    .context("writing companies export")?;
    engine_info!(
        "Exported {} companies with {} documents to {}",
        export.company_count,
        export.document_count,
        export.output_path.display()
    );
    summary.companies_file = export.output_path;

    if let Some(error) = setup_error {
        bail!("harvest aborted: {error}");
    }
    Ok(summary)
}
