use std::path::{Path, PathBuf};

use harvester_core::{BatchResult, Organization};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::filename::safe_file_stem;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub companies_filename: String,
    pub status_dirname: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            companies_filename: "companies.json".to_string(),
            status_dirname: "status".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub company_count: usize,
    pub document_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct CompanyRecord<'a> {
    group: &'a str,
    #[serde(flatten)]
    organization: &'a Organization,
}

/// Writes the per-identifier status of one group to `{status_dir}/{group}.json`.
///
/// Statuses are keyed by URL: "Active" for a harvested page, otherwise the
/// failure reason.
pub fn write_group_status(
    output_dir: &Path,
    group: &str,
    result: &BatchResult,
    options: &ExportOptions,
) -> Result<PathBuf, ExportError> {
    let statuses: Map<String, Value> = result
        .iter()
        .map(|(url, outcome)| (url.to_string(), Value::String(outcome.status_label())))
        .collect();
    let doc = json!({
        "group": group,
        "active": result.success_count(),
        "failed": result.failure_count(),
        "statuses": statuses,
    });

    let writer = AtomicFileWriter::new(output_dir.join(&options.status_dirname));
    let filename = format!("{}.json", safe_file_stem(group));
    Ok(writer.write(&filename, serde_json::to_string_pretty(&doc)?)?)
}

/// Serializes harvested organizations, with their documents, into one export file.
pub fn build_companies_export<'a, I>(
    output_dir: &Path,
    companies: I,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError>
where
    I: IntoIterator<Item = (&'a str, &'a Organization)>,
{
    let records: Vec<CompanyRecord<'_>> = companies
        .into_iter()
        .map(|(group, organization)| CompanyRecord {
            group,
            organization,
        })
        .collect();
    let document_count = records
        .iter()
        .map(|r| r.organization.document_count())
        .sum();

    let writer = AtomicFileWriter::new(output_dir);
    let output_path = writer.write(
        &options.companies_filename,
        serde_json::to_string_pretty(&records)?,
    )?;

    Ok(ExportSummary {
        company_count: records.len(),
        document_count,
        output_path,
    })
}
