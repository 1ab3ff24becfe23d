//! Reconciliation run configuration
//!
//! **Priority:** CLI / environment (via clap) → TOML `[reconcile]` → compiled defaults
//!
//! The resolved [`ReconcileConfig`] is passed explicitly to the clients and
//! the reconciler; nothing reads global state after startup.

use crate::error::{ReconcileError, Result};
use crate::reconciler::DEFAULT_THRESHOLD;
use meshwd_common::config::{get_user_agent, TomlConfig};
use std::time::Duration;

pub const DEFAULT_API_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";
pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;
pub const DEFAULT_SPARQL_REQUESTS_PER_SECOND: u32 = 2;
pub const DEFAULT_SPARQL_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 25;

/// Upper bound accepted by `wbsearchentities` for `limit`
const MAX_SEARCH_LIMIT: u32 = 50;

/// Resolved configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Minimum similarity (0-100) for a match
    pub threshold: f64,
    /// Candidates requested per keyword
    pub search_limit: u32,
    /// Label / Wikipedia language code
    pub language: String,
    pub api_endpoint: String,
    pub sparql_endpoint: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
    pub sparql_requests_per_second: u32,
    /// Total SPARQL attempts per QID
    pub sparql_max_retries: u32,
    /// Keywords in flight at once (1 = sequential)
    pub concurrency: usize,
    /// Abort after this many lookup failures in a row (0 = never)
    pub max_consecutive_failures: usize,
    pub user_agent: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            language: DEFAULT_LANGUAGE.to_string(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            sparql_endpoint: DEFAULT_SPARQL_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            sparql_requests_per_second: DEFAULT_SPARQL_REQUESTS_PER_SECOND,
            sparql_max_retries: DEFAULT_SPARQL_MAX_RETRIES,
            concurrency: 1,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            user_agent: get_user_agent(None),
        }
    }
}

/// Values supplied on the command line or through `MESHWD_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub threshold: Option<f64>,
    pub search_limit: Option<u32>,
    pub language: Option<String>,
    pub concurrency: Option<usize>,
}

impl ReconcileConfig {
    /// Layer the TOML file over compiled defaults
    pub fn from_toml(toml: &TomlConfig) -> Self {
        let section = &toml.reconcile;
        let defaults = Self::default();

        Self {
            threshold: section.threshold.unwrap_or(defaults.threshold),
            search_limit: section.search_limit.unwrap_or(defaults.search_limit),
            language: section.language.clone().unwrap_or(defaults.language),
            api_endpoint: section.api_endpoint.clone().unwrap_or(defaults.api_endpoint),
            sparql_endpoint: section
                .sparql_endpoint
                .clone()
                .unwrap_or(defaults.sparql_endpoint),
            timeout: section
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            requests_per_second: section
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
            sparql_requests_per_second: section
                .sparql_requests_per_second
                .unwrap_or(defaults.sparql_requests_per_second),
            sparql_max_retries: section
                .sparql_max_retries
                .unwrap_or(defaults.sparql_max_retries),
            concurrency: section.concurrency.unwrap_or(defaults.concurrency),
            max_consecutive_failures: section
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures),
            user_agent: get_user_agent(toml.contact.as_deref()),
        }
    }

    /// Apply command-line / environment values on top
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if let Some(limit) = overrides.search_limit {
            self.search_limit = limit;
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        self
    }

    /// Check ranges before any request is made
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(ReconcileError::Config(format!(
                "threshold must be within 0-100, got {}",
                self.threshold
            )));
        }
        if self.search_limit == 0 || self.search_limit > MAX_SEARCH_LIMIT {
            return Err(ReconcileError::Config(format!(
                "search_limit must be within 1-{}, got {}",
                MAX_SEARCH_LIMIT, self.search_limit
            )));
        }
        if self.language.trim().is_empty() {
            return Err(ReconcileError::Config("language must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ReconcileError::Config("concurrency must be at least 1".to_string()));
        }
        if self.requests_per_second == 0 || self.sparql_requests_per_second == 0 {
            return Err(ReconcileError::Config(
                "request rates must be at least 1 per second".to_string(),
            ));
        }
        if self.sparql_max_retries == 0 {
            return Err(ReconcileError::Config(
                "sparql_max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
