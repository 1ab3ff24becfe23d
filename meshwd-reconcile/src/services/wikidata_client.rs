//! Wikidata Action API client
//!
//! Endpoints used (all `GET {api_endpoint}?format=json&...`):
//! - `action=wbsearchentities`: candidate search by keyword
//! - `action=wbgetentities&props=labels`: label fallback for unlabeled hits
//! - `action=wbgetentities&props=sitelinks/urls`: Wikipedia article URL
//!
//! All requests share one rate limiter and carry the configured User-Agent
//! (required by the Wikimedia User-Agent policy).

use super::{is_valid_qid, request_limiter, RequestLimiter};
use crate::config::ReconcileConfig;
use crate::error::LookupError;
use crate::types::{ArticleResolver, Candidate, CandidateLookup, Keyword};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// `wbsearchentities` response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// `wbgetentities` response
#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct EntityDoc {
    #[serde(default)]
    labels: HashMap<String, LanguageValue>,
    #[serde(default)]
    sitelinks: HashMap<String, Sitelink>,
}

#[derive(Debug, Deserialize)]
struct LanguageValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Sitelink {
    title: String,
    #[serde(default)]
    url: Option<String>,
}

/// Wikidata Action API client
pub struct WikidataClient {
    http_client: Client,
    api_endpoint: String,
    language: String,
    search_limit: u32,
    rate_limiter: RequestLimiter,
}

impl WikidataClient {
    pub fn new(config: &ReconcileConfig) -> Result<Self, LookupError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .map_err(|e| LookupError::Network(format!("Invalid User-Agent: {}", e)))?,
        );

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_endpoint: config.api_endpoint.clone(),
            language: config.language.clone(),
            search_limit: config.search_limit,
            rate_limiter: request_limiter(config.requests_per_second),
        })
    }

    /// Issue one API call and decode the JSON body
    ///
    /// The Action API reports most failures as HTTP 200 with an `error`
    /// object, so the body is checked before decoding into `T`.
    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, LookupError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(&self.api_endpoint)
            .query(&[("format", "json")])
            .query(params)
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

        let body: serde_json::Value = response.json().await?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("unknown");
            let info = error.get("info").and_then(|i| i.as_str()).unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: format!("{}: {}", code, info),
            });
        }

        serde_json::from_value(body).map_err(|e| LookupError::Parse(e.to_string()))
    }

    /// Raw `wbsearchentities` hits in service ranking order
    pub async fn search_entities(&self, keyword: &str) -> Result<Vec<SearchHit>, LookupError> {
        let limit = self.search_limit.to_string();
        let response: SearchResponse = self
            .get_json(&[
                ("action", "wbsearchentities"),
                ("search", keyword),
                ("language", self.language.as_str()),
                ("uselang", self.language.as_str()),
                ("type", "item"),
                ("limit", limit.as_str()),
            ])
            .await?;

        debug!(keyword = %keyword, hits = response.search.len(), "Wikidata search complete");
        Ok(response.search)
    }

    /// Label of an item in the configured language
    pub async fn fetch_label(&self, qid: &str) -> Result<Option<String>, LookupError> {
        if !is_valid_qid(qid) {
            return Err(LookupError::InvalidQid(qid.to_string()));
        }

        let response: EntitiesResponse = self
            .get_json(&[
                ("action", "wbgetentities"),
                ("ids", qid),
                ("props", "labels"),
                ("languages", self.language.as_str()),
            ])
            .await?;

        Ok(response
            .entities
            .get(qid)
            .and_then(|doc| doc.labels.get(&self.language))
            .map(|label| label.value.clone()))
    }

    /// Wikipedia article URL for an item, if the sitelink exists
    pub async fn fetch_wikipedia_url(&self, qid: &str) -> Result<Option<String>, LookupError> {
        if !is_valid_qid(qid) {
            return Err(LookupError::InvalidQid(qid.to_string()));
        }

        let response: EntitiesResponse = self
            .get_json(&[
                ("action", "wbgetentities"),
                ("ids", qid),
                ("props", "sitelinks/urls"),
            ])
            .await?;

        let site_key = format!("{}wiki", self.language);
        let url = response
            .entities
            .get(qid)
            .and_then(|doc| doc.sitelinks.get(&site_key))
            .map(|link| {
                link.url
                    .clone()
                    .unwrap_or_else(|| article_url(&self.language, &link.title))
            });

        debug!(qid = %qid, url = ?url, "Sitelink lookup complete");
        Ok(url)
    }
}

/// Build an article URL from a sitelink title
fn article_url(language: &str, title: &str) -> String {
    format!(
        "https://{}.wikipedia.org/wiki/{}",
        language,
        title.replace(' ', "_")
    )
}

/// `Retry-After` header in seconds, if present
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl CandidateLookup for WikidataClient {
    async fn lookup_candidates(&self, keyword: &Keyword) -> Result<Vec<Candidate>, LookupError> {
        let hits = self.search_entities(keyword.as_str()).await?;
        let mut candidates = Vec::with_capacity(hits.len());

        for hit in hits {
            let label = match hit.label.filter(|l| !l.trim().is_empty()) {
                Some(label) => label,
                None => match self.fetch_label(&hit.id).await {
                    Ok(label) => label.unwrap_or_default(),
                    Err(e) => {
                        warn!(qid = %hit.id, error = %e, "Label fallback failed");
                        String::new()
                    }
                },
            };

            candidates.push(Candidate::new(hit.id, label).with_aliases(hit.aliases));
        }

        Ok(candidates)
    }
}

#[async_trait]
impl ArticleResolver for WikidataClient {
    async fn resolve_article(&self, qid: &str) -> Result<Option<String>, LookupError> {
        self.fetch_wikipedia_url(qid).await
    }
}
