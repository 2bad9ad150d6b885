//! Job file for a headless harvest run.
//!
//! ```ron
//! (
//!     output_dir: "output",
//!     groups: [
//!         ("East", ["https://plans.example/fp?c=TT069026"]),
//!     ],
//!     settings: Some((workers: 4, request_timeout_secs: 20)),
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::UrlGroup;
use harvester_engine::{HarvestSettings, PageProfile};
use serde::Deserialize;

pub const DEFAULT_JOB_FILE: &str = "harvest_job.ron";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobFile {
    /// `(group name, page urls)` in processing order.
    pub groups: Vec<(String, Vec<String>)>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub settings: Option<SettingsFile>,
}

/// Tunables as they appear in the job file. Absent fields keep the engine defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_body_bytes: u64,
    pub allowed_content_types: Option<Vec<String>>,
    pub max_attempts: u32,
    pub backoff_base_millis: u64,
    pub backoff_cap_millis: u64,
    pub max_recursion_depth: u32,
    pub revalidation_delay_millis: u64,
    pub workers: usize,
    pub pool_max_idle_per_host: usize,
    pub user_agent: Option<String>,
    pub title_marker: Option<String>,
    pub account_label: Option<String>,
    pub documents_container_id: Option<String>,
    pub document_source: Option<String>,
}

impl Default for SettingsFile {
    fn default() -> Self {
        let d = HarvestSettings::default();
        Self {
            connect_timeout_secs: d.connect_timeout.as_secs(),
            read_timeout_secs: d.read_timeout.as_secs(),
            request_timeout_secs: d.request_timeout.as_secs(),
            max_body_bytes: d.max_body_bytes,
            allowed_content_types: None,
            max_attempts: d.max_attempts,
            backoff_base_millis: millis(d.backoff_base),
            backoff_cap_millis: millis(d.backoff_cap),
            max_recursion_depth: d.max_recursion_depth,
            revalidation_delay_millis: millis(d.revalidation_delay),
            workers: d.workers,
            pool_max_idle_per_host: d.pool_max_idle_per_host,
            user_agent: None,
            title_marker: None,
            account_label: None,
            documents_container_id: None,
            document_source: None,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("LogFile.log")
}

impl SettingsFile {
    pub fn into_settings(self) -> HarvestSettings {
        let defaults = HarvestSettings::default();
        let page_defaults = PageProfile::default();
        HarvestSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_body_bytes: self.max_body_bytes,
            allowed_content_types: self
                .allowed_content_types
                .unwrap_or(defaults.allowed_content_types),
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_millis),
            backoff_cap: Duration::from_millis(self.backoff_cap_millis),
            max_recursion_depth: self.max_recursion_depth,
            revalidation_delay: Duration::from_millis(self.revalidation_delay_millis),
            workers: self.workers,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            page: PageProfile {
                title_marker: self.title_marker.unwrap_or(page_defaults.title_marker),
                account_label: self.account_label.unwrap_or(page_defaults.account_label),
                documents_container_id: self
                    .documents_container_id
                    .unwrap_or(page_defaults.documents_container_id),
                document_source: self.document_source.unwrap_or(page_defaults.document_source),
            },
        }
    }
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        self.settings
            .clone()
            .map(SettingsFile::into_settings)
            .unwrap_or_default()
    }

    /// Groups with blank entries dropped; groups left empty are skipped.
    pub fn url_groups(&self) -> Vec<UrlGroup> {
        self.groups
            .iter()
            .map(|(name, urls)| UrlGroup::new(name.as_str(), urls))
            .filter(|group| !group.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_job_uses_defaults() {
        let job = JobFile::parse(r#"(groups: [("East", ["http://p/1"])])"#).unwrap();

        assert_eq!(job.output_dir, PathBuf::from("output"));
        assert_eq!(job.log_file, PathBuf::from("LogFile.log"));
        assert_eq!(job.harvest_settings(), HarvestSettings::default());
    }

    #[test]
    fn partial_settings_override_only_named_fields() {
        let job = JobFile::parse(
            r#"(
                groups: [],
                output_dir: "out",
                settings: Some((workers: 4, backoff_base_millis: 250, title_marker: Some("Plan Page"))),
            )"#,
        )
        .unwrap();
        let settings = job.harvest_settings();

        assert_eq!(settings.workers, 4);
        assert_eq!(settings.backoff_base, Duration::from_millis(250));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.page.title_marker, "Plan Page");
        assert_eq!(settings.page.account_label, "Account Number");
        assert_eq!(settings.max_body_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn body_limits_can_be_overridden() {
        let job = JobFile::parse(
            r#"(
                groups: [],
                settings: Some((
                    read_timeout_secs: 5,
                    max_body_bytes: 65536,
                    allowed_content_types: Some(["text/html"]),
                )),
            )"#,
        )
        .unwrap();
        let settings = job.harvest_settings();

        assert_eq!(settings.read_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_body_bytes, 65536);
        assert_eq!(settings.allowed_content_types, vec!["text/html".to_string()]);
    }

    #[test]
    fn blank_urls_and_empty_groups_are_dropped() {
        let job = JobFile::parse(
            r#"(groups: [("East", [" http://p/1 ", ""]), ("Empty", ["  "])])"#,
        )
        .unwrap();

        assert_eq!(
            job.url_groups(),
            vec![UrlGroup::new("East", ["http://p/1"])]
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(JobFile::parse(r#"(groups: [], workers: 3)"#).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = JobFile::load(Path::new("/nonexistent/job.ron")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/job.ron"));
    }
}
