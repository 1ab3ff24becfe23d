//! Core types and capability traits
//!
//! Data flows strictly forward for each keyword:
//! `Keyword` → `[Candidate]` → `Option<ScoredCandidate>` → `ReconciliationResult`.
//! Nothing here outlives the processing of one keyword.

use crate::error::{LookupError, ReconcileError};
use async_trait::async_trait;
use std::fmt;

// ============================================================================
// Keyword
// ============================================================================

/// A MeSH term to reconcile (trimmed, never empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(value: impl Into<String>) -> Result<Self, ReconcileError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ReconcileError::InvalidKeyword(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Keyword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Reference to another Wikidata item (instance-of / subclass-of target)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityRef {
    pub qid: String,
    /// Label in the configured language; empty when Wikidata has none
    pub label: String,
}

impl EntityRef {
    pub fn new(qid: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            label: label.into(),
        }
    }
}

/// Type hierarchy of an item: P31 (instance of) and P279 (subclass of)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    pub instance_of: Vec<EntityRef>,
    pub subclass_of: Vec<EntityRef>,
}

impl Relations {
    pub fn is_empty(&self) -> bool {
        self.instance_of.is_empty() && self.subclass_of.is_empty()
    }
}

/// Entity returned by the candidate lookup, in service ranking order
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub qid: String,
    pub label: String,
    /// Alternative labels that matched the search
    pub aliases: Vec<String>,
    pub instance_of: Vec<EntityRef>,
    pub subclass_of: Vec<EntityRef>,
}

impl Candidate {
    pub fn new(qid: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            label: label.into(),
            aliases: Vec::new(),
            instance_of: Vec::new(),
            subclass_of: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relations(mut self, relations: Relations) -> Self {
        self.instance_of = relations.instance_of;
        self.subclass_of = relations.subclass_of;
        self
    }

    /// True when the lookup already supplied type hierarchy data
    pub fn has_relations(&self) -> bool {
        !self.instance_of.is_empty() || !self.subclass_of.is_empty()
    }
}

/// Candidate with its similarity score (0.0-100.0) against the keyword
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

// ============================================================================
// Results
// ============================================================================

/// Note prefix for keywords whose candidate lookup failed
pub const LOOKUP_FAILED_NOTE: &str = "lookup failed";

/// Why a keyword ended up unmatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// Lookup succeeded with zero candidates
    NoCandidates,
    /// Best candidate scored under the threshold
    BelowThreshold,
    /// Candidate lookup failed; carries the diagnostic
    LookupFailed(String),
}

impl UnmatchedReason {
    /// Operator-facing note for the unmatched output
    pub fn note(&self) -> String {
        match self {
            UnmatchedReason::NoCandidates => "no candidates".to_string(),
            UnmatchedReason::BelowThreshold => "below threshold".to_string(),
            UnmatchedReason::LookupFailed(diag) => format!("{}: {}", LOOKUP_FAILED_NOTE, diag),
        }
    }
}

/// Keyword with a confident Wikidata linkage
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRecord {
    pub keyword: Keyword,
    pub qid: String,
    pub label: String,
    pub score: f64,
    pub instance_of: Vec<EntityRef>,
    pub subclass_of: Vec<EntityRef>,
    /// English Wikipedia article, if one exists
    pub wikipedia_url: Option<String>,
}

/// Keyword without a confident match. Carries no QID.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRecord {
    pub keyword: Keyword,
    /// `None` when there were no candidates to score
    pub best_score: Option<f64>,
    pub reason: UnmatchedReason,
}

/// Terminal record, exactly one per input keyword
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationResult {
    Matched(MatchedRecord),
    Unmatched(UnmatchedRecord),
}

impl ReconciliationResult {
    pub fn keyword(&self) -> &Keyword {
        match self {
            ReconciliationResult::Matched(m) => &m.keyword,
            ReconciliationResult::Unmatched(u) => &u.keyword,
        }
    }

    pub fn qid(&self) -> Option<&str> {
        match self {
            ReconciliationResult::Matched(m) => Some(&m.qid),
            ReconciliationResult::Unmatched(_) => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, ReconciliationResult::Matched(_))
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Search for candidate entities by keyword
///
/// Returns candidates in the service's own ranking order, which is the
/// tie-break order during reconciliation.
#[async_trait]
pub trait CandidateLookup: Send + Sync {
    async fn lookup_candidates(&self, keyword: &Keyword) -> Result<Vec<Candidate>, LookupError>;
}

/// Resolve a QID to its Wikipedia article URL
///
/// `Ok(None)` means the item has no article in the configured language.
#[async_trait]
pub trait ArticleResolver: Send + Sync {
    async fn resolve_article(&self, qid: &str) -> Result<Option<String>, LookupError>;
}

/// Resolve a QID's instance-of / subclass-of targets
#[async_trait]
pub trait RelationResolver: Send + Sync {
    async fn resolve_relations(&self, qid: &str) -> Result<Relations, LookupError>;
}
