#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvester_core::ProgressUpdate;
use harvester_engine::{
    CancellationToken, FailureKind, FetchError, FetchedPage, HarvestSettings, PageFetcher,
    ProgressSink,
};

pub const TITLE: &str = "Fund and Fee Information";

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

/// Settings with millisecond backoff so retry paths run fast.
pub fn fast_settings() -> HarvestSettings {
    HarvestSettings {
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(5),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
        workers: 3,
        ..HarvestSettings::default()
    }
}

/// A page of the harvested family. `anchors` are `(href, list item text)`.
pub fn plan_page(name: &str, account: &str, anchors: &[(&str, &str)]) -> String {
    page_with_title(TITLE, name, account, anchors)
}

pub fn page_with_title(title: &str, name: &str, account: &str, anchors: &[(&str, &str)]) -> String {
    let links: String = anchors
        .iter()
        .map(|(href, text)| format!(r#"<a href="{href}"><li>{text}</li></a>"#))
        .collect();
    format!(
        r#"<html><head><title>{title}</title></head><body>
<h2>Plan sponsor <b>{name}</b></h2>
<table><tr><td>Account Number:</td><td>{account}</td></tr></table>
<div id="planDocuments"><ul>{links}</ul></div>
</body></html>"#
    )
}

/// Same page family, but the account cell is empty.
pub fn page_without_account(name: &str) -> String {
    plan_page(name, "", &[("openWindow('http://x/a.pdf')", "A")])
}

#[derive(Debug, Clone)]
pub enum Reply {
    Page(String),
    Fail(FailureKind),
    Panic,
}

/// Fake fetcher replaying a script per URL; the last reply repeats.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, Vec<Reply>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(mut self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts.insert(url.to_string(), replies);
        self
    }

    pub fn page(self, url: &str, html: String) -> Self {
        self.script(url, vec![Reply::Page(html)])
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled(0));
        }
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(url.to_string()).or_insert(0);
            *entry += 1;
            *entry - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .scripts
            .get(url)
            .and_then(|replies| replies.get(call).or_else(|| replies.last()))
            .cloned()
            .unwrap_or(Reply::Fail(FailureKind::HttpStatus(404)));
        match reply {
            Reply::Page(html) => Ok(FetchedPage::html(url, html)),
            Reply::Fail(kind) => Err(FetchError::new(kind, "scripted failure").with_attempts(3)),
            Reply::Panic => panic!("scripted panic for {url}"),
        }
    }
}

/// Records every progress update; optionally stops the batch after `stop_after` completions.
#[derive(Default)]
pub struct RecordingSink {
    updates: Arc<Mutex<Vec<ProgressUpdate>>>,
    stop: Option<(usize, CancellationToken)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(completed: usize, token: CancellationToken) -> Self {
        Self {
            updates: Arc::default(),
            stop: Some((completed, token)),
        }
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.updates().iter().map(|u| u.percent).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, update: ProgressUpdate) {
        if let Some((after, token)) = &self.stop {
            if update.completed >= *after {
                token.cancel();
            }
        }
        self.updates.lock().unwrap().push(update);
    }
}

pub fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
