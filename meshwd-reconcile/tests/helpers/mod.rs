//! In-memory stand-ins for the Wikidata services
//!
//! Each fake records the calls it receives so tests can check which
//! services a keyword touched.

#![allow(dead_code)]

use async_trait::async_trait;
use meshwd_reconcile::error::LookupError;
use meshwd_reconcile::reconciler::Reconciler;
use meshwd_reconcile::types::{
    ArticleResolver, Candidate, CandidateLookup, EntityRef, Keyword, RelationResolver, Relations,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted response for one keyword
#[derive(Clone)]
enum LookupReply {
    Candidates(Vec<Candidate>),
    Fail(String),
}

/// Candidate search with canned replies
///
/// Keywords without a scripted reply get no candidates.
#[derive(Default)]
pub struct FakeLookup {
    replies: HashMap<String, LookupReply>,
    delays: HashMap<String, Duration>,
    fail_all: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup that fails for every keyword
    pub fn unreachable() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_candidates(mut self, keyword: &str, candidates: Vec<Candidate>) -> Self {
        self.replies
            .insert(keyword.to_string(), LookupReply::Candidates(candidates));
        self
    }

    pub fn with_failure(mut self, keyword: &str, message: &str) -> Self {
        self.replies
            .insert(keyword.to_string(), LookupReply::Fail(message.to_string()));
        self
    }

    /// Hold the reply for `keyword` back by `delay`
    pub fn with_delay(mut self, keyword: &str, delay: Duration) -> Self {
        self.delays.insert(keyword.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateLookup for FakeLookup {
    async fn lookup_candidates(&self, keyword: &Keyword) -> Result<Vec<Candidate>, LookupError> {
        self.calls.lock().unwrap().push(keyword.to_string());

        if let Some(delay) = self.delays.get(keyword.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        if self.fail_all {
            return Err(LookupError::Network("connection refused".to_string()));
        }

        match self.replies.get(keyword.as_str()) {
            Some(LookupReply::Candidates(candidates)) => Ok(candidates.clone()),
            Some(LookupReply::Fail(message)) => Err(LookupError::Network(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Article resolution from a fixed QID → URL table
#[derive(Default)]
pub struct FakeArticles {
    urls: HashMap<String, String>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_article(mut self, qid: &str, url: &str) -> Self {
        self.urls.insert(qid.to_string(), url.to_string());
        self
    }

    pub fn with_failure(mut self, qid: &str) -> Self {
        self.failing.push(qid.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleResolver for FakeArticles {
    async fn resolve_article(&self, qid: &str) -> Result<Option<String>, LookupError> {
        self.calls.lock().unwrap().push(qid.to_string());

        if self.failing.iter().any(|q| q == qid) {
            return Err(LookupError::Api {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.urls.get(qid).cloned())
    }
}

/// Relation resolution from a fixed table
#[derive(Default)]
pub struct FakeRelations {
    relations: HashMap<String, Relations>,
    calls: Mutex<Vec<String>>,
}

impl FakeRelations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relations(
        mut self,
        qid: &str,
        instance_of: &[(&str, &str)],
        subclass_of: &[(&str, &str)],
    ) -> Self {
        let to_refs = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(q, l)| EntityRef::new(*q, *l))
                .collect::<Vec<_>>()
        };
        self.relations.insert(
            qid.to_string(),
            Relations {
                instance_of: to_refs(instance_of),
                subclass_of: to_refs(subclass_of),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationResolver for FakeRelations {
    async fn resolve_relations(&self, qid: &str) -> Result<Relations, LookupError> {
        self.calls.lock().unwrap().push(qid.to_string());
        Ok(self.relations.get(qid).cloned().unwrap_or_default())
    }
}

/// Handles to the fakes behind a reconciler
pub struct Fakes {
    pub lookup: Arc<FakeLookup>,
    pub articles: Arc<FakeArticles>,
    pub relations: Arc<FakeRelations>,
}

impl Fakes {
    pub fn new(lookup: FakeLookup, articles: FakeArticles, relations: FakeRelations) -> Self {
        Self {
            lookup: Arc::new(lookup),
            articles: Arc::new(articles),
            relations: Arc::new(relations),
        }
    }

    pub fn reconciler(&self, threshold: f64) -> Reconciler {
        Reconciler::new(
            self.lookup.clone(),
            self.articles.clone(),
            self.relations.clone(),
            threshold,
        )
    }
}

pub fn keywords(values: &[&str]) -> Vec<Keyword> {
    values.iter().map(|v| Keyword::new(*v).unwrap()).collect()
}
