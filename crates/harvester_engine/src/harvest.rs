use std::collections::HashSet;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures_util::{future, stream, StreamExt};
use harvester_core::{
    BatchProgress, BatchResult, FailureReason, HarvestOutcome, Organization, ProgressUpdate,
};
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractionError, PageExtractor, PlanPageExtractor};
use crate::fetch::{PageFetcher, ReqwestFetcher};
use crate::validate::{Validation, Validator};
use crate::{HarvestError, HarvestSettings};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, update: ProgressUpdate);
}

/// Discards progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _update: ProgressUpdate) {}
}

/// Runs fetch, validate and extract for each identifier of a batch across a
/// bounded pool of workers.
#[derive(Clone)]
pub struct Harvester {
    settings: Arc<HarvestSettings>,
    extractor: Arc<dyn PageExtractor>,
}

impl Harvester {
    pub fn new(settings: HarvestSettings) -> Self {
        let extractor = Arc::new(PlanPageExtractor::new(settings.page.clone()));
        Self {
            settings: Arc::new(settings),
            extractor,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvests `urls` over one shared, pooled HTTP client.
    ///
    /// Only a failure to build that client is returned as an error; every
    /// per-identifier failure is recorded in the [`BatchResult`]. After
    /// cancellation the partial result collected so far is returned.
    pub async fn harvest(
        &self,
        urls: &[String],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, HarvestError> {
        let fetcher = ReqwestFetcher::for_batch(&self.settings)?;
        Ok(self
            .harvest_with(Arc::new(fetcher), urls, progress, cancel)
            .await)
    }

    pub async fn harvest_with(
        &self,
        fetcher: Arc<dyn PageFetcher>,
        urls: &[String],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let identifiers = unique_identifiers(urls);
        let workers = self.settings.workers.max(1);
        engine_info!(
            "Harvesting {} pages with {} workers (at most {} requests per page)",
            identifiers.len(),
            workers,
            self.settings.worst_case_requests()
        );

        let mut tracker = BatchProgress::new(identifiers.len());
        let mut result = BatchResult::new();
        progress.emit(tracker.start());

        let mut completions = stream::iter(identifiers)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|url| {
                let unit = Unit {
                    fetcher: Arc::clone(&fetcher),
                    settings: Arc::clone(&self.settings),
                    extractor: Arc::clone(&self.extractor),
                    cancel: cancel.clone(),
                };
                let task = tokio::spawn(unit.run(url.clone()));
                async move { (url, task.await) }
            })
            .buffer_unordered(workers);

        while let Some((url, joined)) = completions.next().await {
            let outcome = match joined {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    engine_debug!("Unit for {} stopped by cancellation", url);
                    continue;
                }
                Err(err) => {
                    engine_error!("Unit for {} aborted: {}", url, err);
                    HarvestOutcome::Failure(FailureReason::UnitAborted(err.to_string()))
                }
            };
            engine_info!("{} -> {}", url, outcome.status_label());
            if result.record(url, outcome) {
                progress.emit(tracker.record_completion());
            }
        }

        if cancel.is_cancelled() {
            engine_warn!(
                "Harvest cancelled: {} of {} pages resolved",
                result.len(),
                tracker.total()
            );
        } else {
            engine_info!(
                "Harvest finished: {} active, {} failed",
                result.success_count(),
                result.failure_count()
            );
        }
        result
    }
}

/// One identifier's fetch-validate-extract sequence, owned by its task.
struct Unit {
    fetcher: Arc<dyn PageFetcher>,
    settings: Arc<HarvestSettings>,
    extractor: Arc<dyn PageExtractor>,
    cancel: CancellationToken,
}

impl Unit {
    /// Returns `None` when the unit stopped because the batch was cancelled.
    async fn run(self, url: String) -> Option<HarvestOutcome> {
        let validator = Validator::new(self.fetcher.as_ref(), &self.settings);
        let document = match validator.find_valid_document(&url, &self.cancel).await {
            Validation::Valid(document) => document,
            Validation::Cancelled => return None,
            Validation::Exhausted(exhaustion) => {
                engine_warn!("No valid page for {}: {:?}", url, exhaustion);
                return Some(HarvestOutcome::Failure(
                    FailureReason::FetchValidationExhausted,
                ));
            }
        };
        Some(classify_extraction(self.extractor.extract(&document)))
    }
}

/// Maps an extraction result to the outcome recorded for its identifier.
///
/// An organization without documents is not useful output and counts as a
/// failure.
pub fn classify_extraction(extracted: Result<Organization, ExtractionError>) -> HarvestOutcome {
    match extracted {
        Ok(org) if org.has_documents() => HarvestOutcome::Success(org),
        Ok(_) => HarvestOutcome::Failure(FailureReason::NoDocuments),
        Err(ExtractionError::WrongPageType { .. }) => {
            HarvestOutcome::Failure(FailureReason::WrongPageType)
        }
        Err(err @ ExtractionError::MalformedAnchor { .. }) => {
            HarvestOutcome::Failure(FailureReason::ExtractionFailed(err.to_string()))
        }
    }
}

/// Drops repeated identifiers, keeping the first occurrence.
fn unique_identifiers(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.iter()
        .filter(|url| {
            let fresh = seen.insert(url.as_str());
            if !fresh {
                engine_warn!("Duplicate identifier {} submitted; harvesting once", url);
            }
            fresh
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::DocumentRef;

    #[test]
    fn duplicates_keep_first_occurrence_order() {
        let urls: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_identifiers(&urls), vec!["b", "a", "c"]);
    }

    #[test]
    fn extraction_results_are_classified() {
        let mut with_doc = Organization::new(Some("Acme".into()));
        with_doc.add_document(DocumentRef::new("http://x/a.pdf", Some("A")));

        assert!(classify_extraction(Ok(with_doc)).is_success());
        assert_eq!(
            classify_extraction(Ok(Organization::new(None))),
            HarvestOutcome::Failure(FailureReason::NoDocuments)
        );
        assert_eq!(
            classify_extraction(Err(ExtractionError::WrongPageType { found: None })),
            HarvestOutcome::Failure(FailureReason::WrongPageType)
        );
        let malformed = classify_extraction(Err(ExtractionError::MalformedAnchor {
            index: 1,
            detail: "missing href attribute".into(),
        }));
        assert!(matches!(
            malformed,
            HarvestOutcome::Failure(FailureReason::ExtractionFailed(_))
        ));
    }
}
