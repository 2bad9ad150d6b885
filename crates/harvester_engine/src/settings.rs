use std::time::Duration;

/// Structure of the harvested page family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProfile {
    /// Expected text of the page's `<title>` element.
    pub title_marker: String,
    /// Label of the table cell next to the account identifier.
    pub account_label: String,
    /// Id of the element holding the document anchors.
    pub documents_container_id: String,
    /// Source recorded on every extracted document reference.
    pub document_source: String,
}

impl Default for PageProfile {
    fn default() -> Self {
        Self {
            title_marker: "Fund and Fee Information".to_string(),
            account_label: "Account Number".to_string(),
            documents_container_id: "planDocuments".to_string(),
            document_source: harvester_core::DEFAULT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub connect_timeout: Duration,
    /// Longest wait for the next read on an open connection.
    pub read_timeout: Duration,
    /// Cap on one whole request, connect and body included.
    pub request_timeout: Duration,
    /// Larger bodies fail the fetch with `FailureKind::TooLarge`.
    pub max_body_bytes: u64,
    /// Accepted `Content-Type` media types. A response without the header is accepted.
    pub allowed_content_types: Vec<String>,
    /// Total network attempts per fetch, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Fetch-and-validate rounds before a page is given up as invalid.
    pub max_recursion_depth: u32,
    /// Pause between validation rounds.
    pub revalidation_delay: Duration,
    pub workers: usize,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    pub page: PageProfile,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            max_body_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            max_recursion_depth: 3,
            revalidation_delay: Duration::ZERO,
            workers: 10,
            pool_max_idle_per_host: 100,
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            page: PageProfile::default(),
        }
    }
}

impl HarvestSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff_base: self.backoff_base,
            backoff_cap: self.backoff_cap,
        }
    }

    /// Upper bound on network calls for one identifier.
    pub fn worst_case_requests(&self) -> u64 {
        u64::from(self.max_attempts.max(1)) * u64::from(self.max_recursion_depth.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    /// Sleep after failed attempt `attempt` (1-based): `min(base * 2^attempt, cap)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_is_power_of_two_seconds_capped_at_30() {
        let policy = HarvestSettings::default().retry_policy();
        let delays: Vec<u64> = (1..=6).map(|k| policy.delay_after(k).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn backoff_never_overflows() {
        let policy = HarvestSettings::default().retry_policy();
        assert_eq!(policy.delay_after(64), Duration::from_secs(30));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let settings = HarvestSettings {
            max_attempts: 0,
            ..HarvestSettings::default()
        };
        assert_eq!(settings.retry_policy().max_attempts, 1);
    }

    #[test]
    fn worst_case_compounds_attempts_and_depth() {
        assert_eq!(HarvestSettings::default().worst_case_requests(), 9);
    }
}
