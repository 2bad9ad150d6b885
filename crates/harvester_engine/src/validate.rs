use std::fmt;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_warn};
use scraper::{ElementRef, Html};
use tokio_util::sync::CancellationToken;

use crate::decode::decode_page;
use crate::dom::{element_text, selector};
use crate::fetch::{backoff, PageFetcher};
use crate::{FetchError, FetchedPage, HarvestSettings};

/// A page confirmed to carry a non-empty account identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDocument {
    pub url: String,
    pub account_id: String,
    /// Decoded page source; parsed again by the extractor.
    pub html: String,
}

impl ValidDocument {
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Why a successfully fetched page was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    NoTable,
    LabelMissing,
    FieldMissing,
    FieldEmpty,
    Undecodable(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::NoTable => write!(f, "no table cells on page"),
            InvalidReason::LabelMissing => write!(f, "account label not found"),
            InvalidReason::FieldMissing => write!(f, "account field missing next to label"),
            InvalidReason::FieldEmpty => write!(f, "account field is empty"),
            InvalidReason::Undecodable(msg) => write!(f, "page could not be decoded: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exhaustion {
    /// The fetcher gave up; the validator does not retry network failures.
    Fetch(FetchError),
    /// Every validation round returned an invalid page.
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(ValidDocument),
    Exhausted(Exhaustion),
    Cancelled,
}

/// Re-fetches a page until it carries an account identifier.
///
/// At most `max_depth` rounds run and each round is one full
/// [`PageFetcher::fetch`] call with its own retries, so the worst case for a
/// single page is `max_attempts * max_depth` network requests.
pub struct Validator<'a> {
    fetcher: &'a dyn PageFetcher,
    account_label: &'a str,
    max_depth: u32,
    round_delay: Duration,
}

impl<'a> Validator<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, settings: &'a HarvestSettings) -> Self {
        Self {
            fetcher,
            account_label: &settings.page.account_label,
            max_depth: settings.max_recursion_depth.max(1),
            round_delay: settings.revalidation_delay,
        }
    }

    pub async fn find_valid_document(&self, url: &str, cancel: &CancellationToken) -> Validation {
        let mut depth = 0;
        loop {
            if cancel.is_cancelled() {
                return Validation::Cancelled;
            }

            let page = match self.fetcher.fetch(url, cancel).await {
                Ok(page) => page,
                Err(err) if err.is_cancelled() => return Validation::Cancelled,
                Err(err) => {
                    engine_warn!("Validation of {} stopped by fetch failure: {}", url, err);
                    return Validation::Exhausted(Exhaustion::Fetch(err));
                }
            };

            let reason = match check_page(&page, self.account_label) {
                Ok(document) => {
                    engine_debug!(
                        "Page {} valid at depth {} (account {})",
                        url,
                        depth,
                        document.account_id
                    );
                    return Validation::Valid(document);
                }
                Err(reason) => reason,
            };

            depth += 1;
            if depth >= self.max_depth {
                engine_error!(
                    "Giving up on {} after {} validation rounds: {}",
                    url,
                    depth,
                    reason
                );
                return Validation::Exhausted(Exhaustion::Invalid(reason));
            }
            engine_warn!(
                "Page {} invalid ({}), re-fetching ({}/{})",
                url,
                reason,
                depth + 1,
                self.max_depth
            );
            backoff(self.round_delay, cancel).await;
        }
    }
}

/// Decodes the page and looks up its account identifier.
pub fn check_page(page: &FetchedPage, account_label: &str) -> Result<ValidDocument, InvalidReason> {
    let html = decode_page(page).map_err(|err| InvalidReason::Undecodable(err.to_string()))?;
    let account_id = find_account_id(&html, account_label)?;
    Ok(ValidDocument {
        url: page.url.clone(),
        account_id,
        html,
    })
}

/// Finds the table cell labelled `label` and returns the adjacent cell's text.
pub fn find_account_id(html: &str, label: &str) -> Result<String, InvalidReason> {
    let doc = Html::parse_document(html);
    let Some(cells) = selector("td, th") else {
        return Err(InvalidReason::NoTable);
    };

    let mut saw_cell = false;
    for cell in doc.select(&cells) {
        saw_cell = true;
        if !label_matches(&element_text(cell), label) {
            continue;
        }
        let value = cell
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "td" | "th"));
        return match value.map(element_text) {
            None => Err(InvalidReason::FieldMissing),
            Some(text) if text.is_empty() => Err(InvalidReason::FieldEmpty),
            Some(text) => Ok(text),
        };
    }

    if saw_cell {
        Err(InvalidReason::LabelMissing)
    } else {
        Err(InvalidReason::NoTable)
    }
}

fn label_matches(text: &str, label: &str) -> bool {
    let clean = |s: &str| s.trim().trim_end_matches(':').trim().to_ascii_lowercase();
    !text.is_empty() && clean(text) == clean(label)
}
