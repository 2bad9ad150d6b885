//! Harvester core: pure data model for harvested organizations and batch results.
mod group;
mod model;
mod outcome;
mod progress;

pub use group::UrlGroup;
pub use model::{DocumentRef, Organization, DEFAULT_SOURCE, UNTITLED};
pub use outcome::{BatchResult, FailureReason, HarvestOutcome, ACTIVE_STATUS};
pub use progress::{BatchProgress, ProgressUpdate};
