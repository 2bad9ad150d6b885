use std::collections::HashMap;
use std::fmt;

use engine_logging::engine_warn;
use serde::Serialize;

use crate::model::Organization;

/// Status written for an identifier whose page was harvested.
pub const ACTIVE_STATUS: &str = "Active";

/// Classified reason a single identifier produced no organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The page could not be fetched, or never carried an account field.
    FetchValidationExhausted,
    /// The page was reachable and valid but is not the harvested page kind.
    WrongPageType,
    /// The page was harvested but listed no documents.
    NoDocuments,
    /// A structural anomaly aborted extraction of this page.
    ExtractionFailed(String),
    /// The unit of work died before producing an outcome.
    UnitAborted(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::FetchValidationExhausted => write!(f, "fetch/validation exhausted"),
            FailureReason::WrongPageType => write!(f, "not the expected page type"),
            FailureReason::NoDocuments => write!(f, "no documents found"),
            FailureReason::ExtractionFailed(detail) => write!(f, "extraction failed: {detail}"),
            FailureReason::UnitAborted(detail) => write!(f, "unit aborted: {detail}"),
        }
    }
}

/// Result of one unit of work: exactly one of an organization or a reason.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestOutcome {
    Success(Organization),
    Failure(FailureReason),
}

impl HarvestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HarvestOutcome::Success(_))
    }

    pub fn organization(&self) -> Option<&Organization> {
        match self {
            HarvestOutcome::Success(org) => Some(org),
            HarvestOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            HarvestOutcome::Success(_) => None,
            HarvestOutcome::Failure(reason) => Some(reason),
        }
    }

    /// Text for the tabular store's status column.
    pub fn status_label(&self) -> String {
        match self {
            HarvestOutcome::Success(_) => ACTIVE_STATUS.to_string(),
            HarvestOutcome::Failure(reason) => reason.to_string(),
        }
    }
}

/// Outcomes of one batch, keyed by input identifier.
///
/// Identifiers are remembered in completion order so successful organizations
/// can be listed in the order they finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    outcomes: HashMap<String, HarvestOutcome>,
    completion_order: Vec<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `identifier`.
    ///
    /// An identifier is resolved at most once; a second record is ignored and
    /// `false` is returned.
    pub fn record(&mut self, identifier: impl Into<String>, outcome: HarvestOutcome) -> bool {
        let identifier = identifier.into();
        if self.outcomes.contains_key(&identifier) {
            engine_warn!("Ignoring duplicate outcome for {}", identifier);
            return false;
        }
        self.completion_order.push(identifier.clone());
        self.outcomes.insert(identifier, outcome);
        true
    }

    pub fn outcome(&self, identifier: &str) -> Option<&HarvestOutcome> {
        self.outcomes.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.outcomes.contains_key(identifier)
    }

    /// Identifiers with their outcomes, in completion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HarvestOutcome)> {
        self.completion_order
            .iter()
            .filter_map(|id| self.outcomes.get(id).map(|outcome| (id.as_str(), outcome)))
    }

    /// Successfully harvested organizations, in completion order.
    pub fn organizations(&self) -> impl Iterator<Item = &Organization> {
        self.iter().filter_map(|(_, outcome)| outcome.organization())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }
}
