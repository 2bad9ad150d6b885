use scraper::{ElementRef, Selector};

/// Parses a CSS selector, logging instead of failing on bad input.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(err) => {
            engine_logging::engine_error!("Invalid selector {:?}: {}", css, err);
            None
        }
    }
}

/// Text content of an element with whitespace runs collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
