use std::sync::LazyLock;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::{DocumentRef, Organization};
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::dom::{element_text, non_empty, selector};
use crate::{PageProfile, ValidDocument};

static OPEN_WINDOW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"openWindow\('([^']+)").ok());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("page title {found:?} is not the expected page type")]
    WrongPageType { found: Option<String> },
    #[error("document anchor {index} is malformed: {detail}")]
    MalformedAnchor { index: usize, detail: String },
}

pub trait PageExtractor: Send + Sync {
    fn extract(&self, document: &ValidDocument) -> Result<Organization, ExtractionError>;
}

/// Extractor for the "Fund and Fee Information" page family:
/// - checks the `<title>` marker
/// - reads the organization name from the first `<h2><b>`
/// - collects `openWindow('<url>')` anchors under the documents container.
#[derive(Debug, Clone, Default)]
pub struct PlanPageExtractor {
    profile: PageProfile,
}

impl PlanPageExtractor {
    pub fn new(profile: PageProfile) -> Self {
        Self { profile }
    }

    fn extract_from(&self, doc: &Html, url: &str) -> Result<Organization, ExtractionError> {
        let title = page_title(doc);
        if title.as_deref() != Some(self.profile.title_marker.as_str()) {
            return Err(ExtractionError::WrongPageType { found: title });
        }

        let name = organization_name(doc);
        if name.is_none() {
            engine_warn!("No organization name found on {}", url);
        }
        let mut org = Organization::new(name);

        let Some(container) = self.documents_container(doc) else {
            engine_warn!(
                "No #{} container on {}",
                self.profile.documents_container_id,
                url
            );
            return Ok(org);
        };

        let Some(anchors) = selector("a") else {
            return Ok(org);
        };
        for (index, anchor) in container.select(&anchors).enumerate() {
            let href = anchor
                .value()
                .attr("href")
                .ok_or_else(|| ExtractionError::MalformedAnchor {
                    index,
                    detail: "missing href attribute".to_string(),
                })?;
            let Some(doc_url) = url_from_open_window(href) else {
                engine_warn!("Skipping anchor {} on {}: unrecognised href {:?}", index, url, href);
                continue;
            };
            let document = DocumentRef::new(doc_url, anchor_title(anchor).as_deref())
                .with_source(self.profile.document_source.as_str());
            if !org.add_document(document) {
                engine_debug!("Duplicate document {} on {}", doc_url, url);
            }
        }

        Ok(org)
    }

    fn documents_container<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>> {
        let sel = selector(&format!("#{}", self.profile.documents_container_id))?;
        doc.select(&sel).next()
    }
}

impl PageExtractor for PlanPageExtractor {
    fn extract(&self, document: &ValidDocument) -> Result<Organization, ExtractionError> {
        let doc = document.parse();
        self.extract_from(&doc, &document.url)
    }
}

/// Recovers `<url>` from an `openWindow('<url>')` script call.
pub fn url_from_open_window(href: &str) -> Option<&str> {
    let re = OPEN_WINDOW.as_ref()?;
    re.captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn page_title(doc: &Html) -> Option<String> {
    let sel = selector("title")?;
    doc.select(&sel)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

fn organization_name(doc: &Html) -> Option<String> {
    let h2 = selector("h2")?;
    let bold = selector("b")?;
    doc.select(&h2)
        .next()?
        .select(&bold)
        .next()
        .map(element_text)
        .and_then(non_empty)
}

fn anchor_title(anchor: ElementRef<'_>) -> Option<String> {
    let li = selector("li")?;
    anchor.select(&li).next().map(element_text).and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::url_from_open_window;

    #[test]
    fn open_window_call_yields_first_argument() {
        assert_eq!(
            url_from_open_window("javascript:openWindow('http://x/a.pdf')"),
            Some("http://x/a.pdf")
        );
        assert_eq!(
            url_from_open_window("openWindow('/docs/fee.pdf', 'popup')"),
            Some("/docs/fee.pdf")
        );
    }

    #[test]
    fn other_hrefs_do_not_match() {
        assert_eq!(url_from_open_window("http://x/a.pdf"), None);
        assert_eq!(url_from_open_window("javascript:openWindow()"), None);
        assert_eq!(url_from_open_window("openWindow('')"), None);
    }
}
