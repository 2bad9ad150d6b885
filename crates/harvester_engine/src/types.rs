use std::fmt;

use harvester_core::{BatchResult, ProgressUpdate};

/// Raw page content as returned by one successful network retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedPage {
    /// A 200 `text/html` page; handy for fakes.
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            bytes: body.into().into_bytes(),
        }
    }
}

/// Terminal fetch failure, returned as data after retries are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn cancelled(attempts: u32) -> Self {
        Self::new(FailureKind::Cancelled, "cancelled before request").with_attempts(attempts)
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus(u16),
    Connection,
    Timeout,
    InvalidUrl,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Cancelled,
    Other,
}

impl FailureKind {
    /// Transport and status failures are retried; the rest end the fetch at once.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::HttpStatus(_)
                | FailureKind::Connection
                | FailureKind::Timeout
                | FailureKind::Other
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpStatus(code) => write!(f, "HTTP error {code}"),
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::TooLarge { max_bytes, actual } => match actual {
                Some(actual) => write!(f, "response too large ({actual} > {max_bytes} bytes)"),
                None => write!(f, "response too large (over {max_bytes} bytes)"),
            },
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Fatal batch-setup failure. Per-identifier failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestError {
    #[error("failed to build shared http client: {0}")]
    ClientSetup(String),
    #[error("failed to start async runtime: {0}")]
    Runtime(String),
}

/// Events delivered by [`crate::EngineHandle`] to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress {
        group: String,
        update: ProgressUpdate,
    },
    GroupCompleted {
        group: String,
        result: BatchResult,
    },
    Failed {
        group: String,
        error: HarvestError,
    },
    Finished {
        cancelled: bool,
    },
}
