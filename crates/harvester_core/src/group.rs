/// The identifiers of one worksheet/collection in the tabular store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGroup {
    pub name: String,
    pub urls: Vec<String>,
}

impl UrlGroup {
    /// Builds a group, trimming entries and dropping blank ones.
    pub fn new<I, S>(name: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|url| url.as_ref().trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        Self {
            name: name.into(),
            urls,
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
