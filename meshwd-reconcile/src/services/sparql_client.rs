//! Wikidata Query Service (SPARQL) client
//!
//! Resolves P31 (instance of) and P279 (subclass of) for a matched item,
//! with labels in the configured language.
//!
//! The query service throttles aggressively, so this client retries:
//! - HTTP 429: wait `Retry-After` (or 10 s), then retry
//! - other failures: exponential backoff (1 s, 2 s, 4 s, ...)
//! - gives up after `sparql_max_retries` attempts

use super::{is_valid_qid, qid_from_uri, request_limiter, RequestLimiter};
use crate::config::ReconcileConfig;
use crate::error::LookupError;
use crate::services::wikidata_client::retry_after;
use crate::types::{EntityRef, RelationResolver, Relations};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Wait applied to a 429 without `Retry-After`
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(10);

/// First backoff step for non-429 failures
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<RelationBinding>,
}

#[derive(Debug, Deserialize)]
struct RelationBinding {
    p31: Option<BindingValue>,
    #[serde(rename = "p31Label")]
    p31_label: Option<BindingValue>,
    p279: Option<BindingValue>,
    #[serde(rename = "p279Label")]
    p279_label: Option<BindingValue>,
}

#[derive(Debug, Deserialize)]
struct BindingValue {
    value: String,
}

/// SPARQL query for the type hierarchy of one item
pub fn relations_query(qid: &str, language: &str) -> String {
    format!(
        r#"SELECT ?p31 ?p31Label ?p279 ?p279Label WHERE {{
  OPTIONAL {{ wd:{qid} wdt:P31 ?p31. }}
  OPTIONAL {{ wd:{qid} wdt:P279 ?p279. }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "[AUTO_LANGUAGE],{language}". }}
}}"#
    )
}

/// Fold result rows into sorted, de-duplicated relations
fn collect_relations(bindings: Vec<RelationBinding>) -> Relations {
    let mut instance_of: BTreeMap<String, String> = BTreeMap::new();
    let mut subclass_of: BTreeMap<String, String> = BTreeMap::new();

    for row in bindings {
        if let Some(target) = row.p31 {
            let label = row.p31_label.map(|l| l.value).unwrap_or_default();
            instance_of
                .entry(qid_from_uri(&target.value).to_string())
                .or_insert(label);
        }
        if let Some(target) = row.p279 {
            let label = row.p279_label.map(|l| l.value).unwrap_or_default();
            subclass_of
                .entry(qid_from_uri(&target.value).to_string())
                .or_insert(label);
        }
    }

    let into_refs = |map: BTreeMap<String, String>| {
        map.into_iter()
            .map(|(qid, label)| EntityRef::new(qid, label))
            .collect::<Vec<_>>()
    };

    Relations {
        instance_of: into_refs(instance_of),
        subclass_of: into_refs(subclass_of),
    }
}

/// Wikidata Query Service client
pub struct SparqlClient {
    http_client: Client,
    endpoint: String,
    language: String,
    max_attempts: u32,
    rate_limit_wait: Duration,
    backoff_base: Duration,
    rate_limiter: RequestLimiter,
}

impl SparqlClient {
    pub fn new(config: &ReconcileConfig) -> Result<Self, LookupError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .map_err(|e| LookupError::Network(format!("Invalid User-Agent: {}", e)))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/sparql-results+json"),
        );

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.sparql_endpoint.clone(),
            language: config.language.clone(),
            max_attempts: config.sparql_max_retries.max(1),
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            backoff_base: DEFAULT_BACKOFF_BASE,
            rate_limiter: request_limiter(config.sparql_requests_per_second),
        })
    }

    /// Override retry waits (tests use millisecond values)
    pub fn with_retry_timing(mut self, rate_limit_wait: Duration, backoff_base: Duration) -> Self {
        self.rate_limit_wait = rate_limit_wait;
        self.backoff_base = backoff_base;
        self
    }

    /// Single query attempt
    async fn query_once(&self, query: &str) -> Result<Relations, LookupError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("query", query), ("format", "json")])
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited {
                retry_after: retry_after(&response),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SparqlResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        Ok(collect_relations(parsed.results.bindings))
    }

    /// Relations for a QID, retrying transient failures
    pub async fn fetch_relations(&self, qid: &str) -> Result<Relations, LookupError> {
        if !is_valid_qid(qid) {
            return Err(LookupError::InvalidQid(qid.to_string()));
        }

        let query = relations_query(qid, &self.language);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.query_once(&query).await {
                Ok(relations) => {
                    debug!(
                        qid = %qid,
                        attempt,
                        instances = relations.instance_of.len(),
                        subclasses = relations.subclass_of.len(),
                        "SPARQL relations resolved"
                    );
                    return Ok(relations);
                }
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                return Err(err);
            }

            let wait = match &err {
                LookupError::RateLimited { retry_after } => {
                    retry_after.unwrap_or(self.rate_limit_wait)
                }
                _ => self.backoff_base * 2u32.saturating_pow(attempt - 1),
            };

            warn!(
                qid = %qid,
                attempt,
                max_attempts = self.max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "SPARQL query failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl RelationResolver for SparqlClient {
    async fn resolve_relations(&self, qid: &str) -> Result<Relations, LookupError> {
        self.fetch_relations(qid).await
    }
}
