//! meshwd-reconcile library interface
//!
//! Cross-references MeSH keywords against Wikidata: each keyword becomes
//! either a matched row (QID, type hierarchy, Wikipedia article) or an
//! unmatched row.
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod config;
pub mod error;
pub mod keywords;
pub mod output;
pub mod pipeline;
pub mod reconciler;
pub mod services;
pub mod similarity;
pub mod types;

pub use crate::config::ReconcileConfig;
pub use crate::error::{LookupError, ReconcileError, Result};
pub use crate::reconciler::{reconcile, Decision, Reconciler};
pub use crate::types::{Candidate, Keyword, ReconciliationResult};

use crate::services::{SparqlClient, WikidataClient};
use std::sync::Arc;

/// Build a reconciler backed by the live Wikidata services
///
/// One `WikidataClient` serves both candidate search and article
/// resolution, so they share a rate limiter.
pub fn build_reconciler(config: &ReconcileConfig) -> Result<Reconciler> {
    config.validate()?;

    let wikidata = Arc::new(WikidataClient::new(config)?);
    let sparql = Arc::new(SparqlClient::new(config)?);

    Ok(Reconciler::new(
        wikidata.clone(),
        wikidata,
        sparql,
        config.threshold,
    ))
}
