use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

pub const UNTITLED: &str = "Untitled";
pub const DEFAULT_SOURCE: &str = "TransAmerica";

/// One downloadable file linked from an organization's page.
///
/// Identity is the URL: two references with the same URL are equal whatever
/// their titles.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    url: String,
    title: String,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_location: Option<PathBuf>,
}

impl DocumentRef {
    /// Builds a reference; a missing or blank title becomes [`UNTITLED`].
    pub fn new(url: impl Into<String>, title: Option<&str>) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();
        Self {
            url: url.into(),
            title,
            source: DEFAULT_SOURCE.to_string(),
            file_location: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_file_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.file_location = Some(location.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file_location(&self) -> Option<&PathBuf> {
        self.file_location.as_ref()
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for DocumentRef {}

impl Hash for DocumentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// The harvested entity: an organization name plus its document references.
///
/// `participant_count` and `asset_value` are left at zero by the harvester;
/// they exist for downstream enrichment.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Organization {
    name: Option<String>,
    #[serde(serialize_with = "serialize_documents")]
    documents: IndexMap<String, DocumentRef>,
    pub participant_count: u64,
    pub asset_value: u64,
}

impl Organization {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("Unknown organization")
    }

    /// Adds a document unless one with the same URL is already present.
    ///
    /// Returns `true` when the document was inserted.
    pub fn add_document(&mut self, document: DocumentRef) -> bool {
        if self.documents.contains_key(document.url()) {
            return false;
        }
        self.documents.insert(document.url.clone(), document);
        true
    }

    pub fn contains_document(&self, url: &str) -> bool {
        self.documents.contains_key(url)
    }

    /// Documents in the order they were first added.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentRef> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }
}

fn serialize_documents<S>(
    documents: &IndexMap<String, DocumentRef>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(documents.values())
}
