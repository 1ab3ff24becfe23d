//! Per-keyword reconciliation
//!
//! The decision itself ([`reconcile`]) is pure: keyword and candidates in,
//! [`Decision`] out. [`Reconciler`] wraps it with the three external calls:
//! candidate lookup before, relations and article resolution after (matched
//! keywords only).

use crate::similarity::score_candidate;
use crate::types::{
    ArticleResolver, Candidate, CandidateLookup, Keyword, MatchedRecord, ReconciliationResult,
    RelationResolver, ScoredCandidate, UnmatchedReason, UnmatchedRecord,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default minimum score for a match
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Outcome of the pure reconciliation step
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Match(ScoredCandidate),
    NoMatch {
        best_score: Option<f64>,
        reason: UnmatchedReason,
    },
}

/// Pick the highest-scoring candidate
///
/// Ties keep the earliest candidate, so the lookup service's ranking decides.
pub fn select_best(keyword: &Keyword, candidates: &[Candidate]) -> Option<ScoredCandidate> {
    let mut best: Option<(usize, f64)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let score = score_candidate(keyword, candidate);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, score)| ScoredCandidate {
        candidate: candidates[index].clone(),
        score,
    })
}

/// Apply the threshold to the best candidate
pub fn classify(best: Option<ScoredCandidate>, threshold: f64) -> Decision {
    match best {
        None => Decision::NoMatch {
            best_score: None,
            reason: UnmatchedReason::NoCandidates,
        },
        Some(scored) if scored.score >= threshold => Decision::Match(scored),
        Some(scored) => Decision::NoMatch {
            best_score: Some(scored.score),
            reason: UnmatchedReason::BelowThreshold,
        },
    }
}

/// Pure core: score, select, classify
pub fn reconcile(keyword: &Keyword, candidates: &[Candidate], threshold: f64) -> Decision {
    classify(select_best(keyword, candidates), threshold)
}

/// Result of processing one keyword end to end
#[derive(Debug, Clone)]
pub struct KeywordOutcome {
    pub result: ReconciliationResult,
    /// True when the candidate lookup itself failed
    pub lookup_failed: bool,
}

/// Runs one keyword through lookup, reconciliation and enrichment
///
/// Holds no per-keyword state; safe to share across concurrent tasks.
pub struct Reconciler {
    lookup: Arc<dyn CandidateLookup>,
    articles: Arc<dyn ArticleResolver>,
    relations: Arc<dyn RelationResolver>,
    threshold: f64,
}

impl Reconciler {
    pub fn new(
        lookup: Arc<dyn CandidateLookup>,
        articles: Arc<dyn ArticleResolver>,
        relations: Arc<dyn RelationResolver>,
        threshold: f64,
    ) -> Self {
        Self {
            lookup,
            articles,
            relations,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Process a single keyword. Never fails: lookup errors become an
    /// unmatched result with a diagnostic note.
    pub async fn process(&self, keyword: Keyword) -> KeywordOutcome {
        let candidates = match self.lookup.lookup_candidates(&keyword).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Candidate lookup failed");
                return KeywordOutcome {
                    result: ReconciliationResult::Unmatched(UnmatchedRecord {
                        keyword,
                        best_score: None,
                        reason: UnmatchedReason::LookupFailed(e.to_string()),
                    }),
                    lookup_failed: true,
                };
            }
        };

        debug!(keyword = %keyword, candidates = candidates.len(), "Candidates retrieved");

        let result = match reconcile(&keyword, &candidates, self.threshold) {
            Decision::Match(scored) => {
                ReconciliationResult::Matched(self.enrich(keyword, scored).await)
            }
            Decision::NoMatch { best_score, reason } => {
                debug!(keyword = %keyword, best_score = ?best_score, "No confident match");
                ReconciliationResult::Unmatched(UnmatchedRecord {
                    keyword,
                    best_score,
                    reason,
                })
            }
        };

        KeywordOutcome {
            result,
            lookup_failed: false,
        }
    }

    /// Attach type hierarchy and Wikipedia article to a match
    ///
    /// Enrichment failures leave the fields empty; the keyword stays matched.
    async fn enrich(&self, keyword: Keyword, scored: ScoredCandidate) -> MatchedRecord {
        let ScoredCandidate { mut candidate, score } = scored;

        if !candidate.has_relations() {
            match self.relations.resolve_relations(&candidate.qid).await {
                Ok(relations) => candidate = candidate.with_relations(relations),
                Err(e) => {
                    warn!(qid = %candidate.qid, error = %e, "Failed to resolve instance/subclass relations");
                }
            }
        }

        let wikipedia_url = match self.articles.resolve_article(&candidate.qid).await {
            Ok(url) => url,
            Err(e) => {
                warn!(qid = %candidate.qid, error = %e, "Failed to resolve Wikipedia article");
                None
            }
        };

        debug!(
            keyword = %keyword,
            qid = %candidate.qid,
            score,
            has_article = wikipedia_url.is_some(),
            "Keyword matched"
        );

        MatchedRecord {
            keyword,
            qid: candidate.qid,
            label: candidate.label,
            score,
            instance_of: candidate.instance_of,
            subclass_of: candidate.subclass_of,
            wikipedia_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kw(s: &str) -> Keyword {
        Keyword::new(s).unwrap()
    }

    #[test]
    fn test_exact_match_scenario() {
        let candidates = vec![
            Candidate::new("Q12206", "Diabetes mellitus"),
            Candidate::new("Q3025883", "diabetes insipidus"),
        ];

        match reconcile(&kw("Diabetes Mellitus"), &candidates, DEFAULT_THRESHOLD) {
            Decision::Match(scored) => {
                assert_eq!(scored.candidate.qid, "Q12206");
                assert_eq!(scored.score, 100.0);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_no_candidates_is_unmatched() {
        assert_eq!(
            reconcile(&kw("Xyzzyplasia123"), &[], DEFAULT_THRESHOLD),
            Decision::NoMatch {
                best_score: None,
                reason: UnmatchedReason::NoCandidates
            }
        );
    }

    #[test]
    fn test_misspelling_matches() {
        let candidates = vec![Candidate::new("Q18216", "Aspirin")];
        let decision = reconcile(&kw("Asprin"), &candidates, DEFAULT_THRESHOLD);
        assert!(matches!(decision, Decision::Match(ref s) if s.candidate.qid == "Q18216"));
    }

    #[test]
    fn test_below_threshold_unmatched() {
        let candidates = vec![Candidate::new("Q1", "Celltype")];
        match reconcile(&kw("Cell"), &candidates, DEFAULT_THRESHOLD) {
            Decision::NoMatch { best_score, reason } => {
                assert_eq!(reason, UnmatchedReason::BelowThreshold);
                assert_eq!(best_score, Some(50.0));
            }
            other => panic!("expected no match, got {:?}", other),
        }
    }

    #[test]
    fn test_tie_keeps_first_candidate() {
        let candidates = vec![
            Candidate::new("Q10", "Heart"),
            Candidate::new("Q20", "heart"),
            Candidate::new("Q30", "HEART"),
        ];
        let best = select_best(&kw("heart"), &candidates).unwrap();
        assert_eq!(best.candidate.qid, "Q10");
    }

    #[test]
    fn test_later_better_candidate_wins() {
        let candidates = vec![
            Candidate::new("Q1", "Heart failure"),
            Candidate::new("Q2", "Heart"),
        ];
        let best = select_best(&kw("Heart"), &candidates).unwrap();
        assert_eq!(best.candidate.qid, "Q2");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let scored = ScoredCandidate {
            candidate: Candidate::new("Q1", "x"),
            score: 80.0,
        };
        assert!(matches!(classify(Some(scored), 80.0), Decision::Match(_)));
    }

    #[test]
    fn test_alternate_threshold() {
        let candidates = vec![Candidate::new("Q1", "Celltype")];
        assert!(matches!(
            reconcile(&kw("Cell"), &candidates, 40.0),
            Decision::Match(_)
        ));
    }

    proptest! {
        #[test]
        fn prop_threshold_partition(score in 0.0f64..=100.0, threshold in 0.0f64..=100.0) {
            let scored = ScoredCandidate { candidate: Candidate::new("Q1", "x"), score };
            let decision = classify(Some(scored), threshold);
            if score >= threshold {
                prop_assert!(matches!(decision, Decision::Match(_)));
            } else {
                let is_below = matches!(
                    decision,
                    Decision::NoMatch { reason: UnmatchedReason::BelowThreshold, .. }
                );
                prop_assert!(is_below);
            }
        }

        #[test]
        fn prop_selected_score_is_maximum(labels in proptest::collection::vec("[a-z ]{0,10}", 1..6)) {
            let keyword = kw("cardiac arrest");
            let candidates: Vec<Candidate> = labels
                .iter()
                .enumerate()
                .map(|(i, l)| Candidate::new(format!("Q{}", i + 1), l.clone()))
                .collect();
            let best = select_best(&keyword, &candidates).unwrap();
            for candidate in &candidates {
                prop_assert!(score_candidate(&keyword, candidate) <= best.score);
            }
        }

        #[test]
        fn prop_empty_candidates_never_match(threshold in 0.0f64..=100.0) {
            let is_no_match = matches!(
                reconcile(&kw("anything"), &[], threshold),
                Decision::NoMatch { best_score: None, .. }
            );
            prop_assert!(is_no_match);
        }
    }
}
