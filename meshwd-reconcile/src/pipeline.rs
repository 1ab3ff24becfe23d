//! Batch orchestration
//!
//! Feeds keywords through a [`Reconciler`] with bounded concurrency, writes
//! each result in input order, and decides when the run as a whole has
//! failed.
//!
//! **Ordering:** `buffered` yields outcomes in submission order, so output
//! rows follow the input file even when lookups complete out of order.
//!
//! **Run-level failure:** one failing keyword is recorded and skipped. The run
//! aborts only when lookups fail `max_consecutive_failures` times in a row, or
//! when every attempted lookup failed.

use crate::error::{ReconcileError, Result};
use crate::output::ResultSink;
use crate::reconciler::Reconciler;
use crate::types::{Keyword, ReconciliationResult};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, info};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Keywords in the input list
    pub total: usize,
    /// Skipped because a previous run already wrote them
    pub skipped: usize,
    /// Keywords that went through lookup
    pub processed: usize,
    pub matched: usize,
    /// Matched keywords with a Wikipedia article
    pub with_article: usize,
    pub unmatched: usize,
    /// Unmatched because the candidate lookup failed
    pub lookup_failures: usize,
}

impl RunStats {
    fn record(&mut self, result: &ReconciliationResult, lookup_failed: bool) {
        self.processed += 1;
        match result {
            ReconciliationResult::Matched(m) => {
                self.matched += 1;
                if m.wikipedia_url.is_some() {
                    self.with_article += 1;
                }
            }
            ReconciliationResult::Unmatched(_) => self.unmatched += 1,
        }
        if lookup_failed {
            self.lookup_failures += 1;
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} processed ({} matched, {} with article, {} unmatched, {} lookup failures), {} skipped of {}",
            self.processed,
            self.matched,
            self.with_article,
            self.unmatched,
            self.lookup_failures,
            self.skipped,
            self.total
        )
    }
}

/// Summary returned by a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: RunStats,
}

/// Drop keywords already present in previous output
///
/// Returns the remaining keywords and how many were skipped.
pub fn filter_processed(keywords: Vec<Keyword>, processed: &HashSet<String>) -> (Vec<Keyword>, usize) {
    if processed.is_empty() {
        return (keywords, 0);
    }

    let before = keywords.len();
    let remaining: Vec<Keyword> = keywords
        .into_iter()
        .filter(|k| !processed.contains(k.as_str()))
        .collect();
    let skipped = before - remaining.len();
    (remaining, skipped)
}

/// Runs a keyword list through the reconciler into a sink
pub struct BatchRunner {
    reconciler: Reconciler,
    concurrency: usize,
    max_consecutive_failures: usize,
}

impl BatchRunner {
    pub fn new(reconciler: Reconciler, concurrency: usize, max_consecutive_failures: usize) -> Self {
        Self {
            reconciler,
            concurrency: concurrency.max(1),
            max_consecutive_failures,
        }
    }

    /// Process every keyword, writing results as they arrive in input order
    ///
    /// `skipped` is carried into the statistics only.
    pub async fn run(
        &self,
        keywords: Vec<Keyword>,
        skipped: usize,
        sink: &mut ResultSink,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut stats = RunStats {
            total: keywords.len() + skipped,
            skipped,
            ..Default::default()
        };
        let mut consecutive_failures = 0usize;

        info!(
            keywords = keywords.len(),
            skipped,
            concurrency = self.concurrency,
            threshold = self.reconciler.threshold(),
            "Starting reconciliation run"
        );

        let mut outcomes = stream::iter(keywords)
            .map(|keyword| self.reconciler.process(keyword))
            .buffered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            sink.write(&outcome.result)?;
            stats.record(&outcome.result, outcome.lookup_failed);

            info!(
                keyword = %outcome.result.keyword(),
                matched = outcome.result.is_matched(),
                qid = outcome.result.qid().unwrap_or("-"),
                "Processed keyword ({} processed, {} skipped)",
                stats.processed,
                stats.skipped
            );

            if outcome.lookup_failed {
                consecutive_failures += 1;
            } else {
                consecutive_failures = 0;
            }

            if self.max_consecutive_failures > 0 && consecutive_failures >= self.max_consecutive_failures {
                sink.flush()?;
                error!(
                    consecutive_failures,
                    processed = stats.processed,
                    "Aborting run: lookup service appears unreachable"
                );
                return Err(ReconcileError::ServiceUnavailable(format!(
                    "{} consecutive lookup failures after {} keywords",
                    consecutive_failures, stats.processed
                )));
            }
        }

        sink.flush()?;

        if stats.processed > 0 && stats.lookup_failures == stats.processed {
            error!(failures = stats.lookup_failures, "Every candidate lookup failed");
            return Err(ReconcileError::ServiceUnavailable(format!(
                "all {} candidate lookups failed",
                stats.lookup_failures
            )));
        }

        let finished_at = Utc::now();
        info!(
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Processing complete: {}",
            stats.display_string()
        );

        Ok(RunSummary {
            started_at,
            finished_at,
            stats,
        })
    }
}
