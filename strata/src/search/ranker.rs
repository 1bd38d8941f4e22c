//! Hybrid ranking of lexical and vector scores
//!
//! Both backends produce scores on different scales: BM25 is unbounded and
//! cosine similarity lives in `[-1, 1]`. The ranker rescales each candidate set
//! by its best score and blends them with weights that sum to 1.0, so the
//! final score of every result is in `[0, 1]`.
//!
//! Results merged from several partitions are rescaled once more with
//! [`HybridRanker::rescale`], against the best raw score of the merged set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::RankerConfig;
use crate::models::{QueryType, RawScores};

/// Weighted combination of normalized BM25 and vector scores
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HybridRanker {
    bm25_weight: f32,
    vector_weight: f32,
}

impl HybridRanker {
    /// Create a ranker, returning an error if the weights are invalid
    pub fn try_new(config: &RankerConfig) -> Result<Self, String> {
        let mut ranker = Self {
            bm25_weight: config.bm25_weight,
            vector_weight: config.vector_weight,
        };
        ranker.validate()?;
        ranker.normalize_weights();
        Ok(ranker)
    }

    /// Validate the weights
    ///
    /// - Each weight must be a finite number >= 0.0
    /// - At least one weight must be positive
    pub fn validate(&self) -> Result<(), String> {
        if !self.bm25_weight.is_finite() || self.bm25_weight < 0.0 {
            return Err("bm25_weight must be >= 0.0".to_string());
        }
        if !self.vector_weight.is_finite() || self.vector_weight < 0.0 {
            return Err("vector_weight must be >= 0.0".to_string());
        }
        if self.bm25_weight + self.vector_weight <= 0.0 {
            return Err("at least one ranker weight must be positive".to_string());
        }
        Ok(())
    }

    /// Normalize BM25 and vector weights to sum to 1.0, preserving their ratio
    pub fn normalize_weights(&mut self) {
        let total = self.bm25_weight + self.vector_weight;
        if total > 0.0 {
            self.bm25_weight /= total;
            self.vector_weight /= total;
        }
    }

    pub fn bm25_weight(&self) -> f32 {
        self.bm25_weight
    }

    pub fn vector_weight(&self) -> f32 {
        self.vector_weight
    }

    /// Combine both candidate sets into one score per document.
    ///
    /// Documents missing from one backend get 0 for that backend.
    pub fn combine(
        &self,
        bm25: &HashMap<String, f32>,
        vector: &HashMap<String, f32>,
    ) -> HashMap<String, f32> {
        let bm25 = normalize_scores(bm25);
        let vector = normalize_scores(vector);

        let mut combined: HashMap<String, f32> = HashMap::with_capacity(bm25.len());
        for (id, score) in bm25 {
            *combined.entry(id).or_insert(0.0) += self.bm25_weight * score;
        }
        for (id, score) in vector {
            *combined.entry(id).or_insert(0.0) += self.vector_weight * score;
        }
        combined
    }

    /// Put candidates gathered from several indexes on one scale.
    ///
    /// Each backend is divided by its best raw score over the whole set and
    /// blended as in [`Self::combine`]. A hybrid set without any vector score
    /// is ranked by BM25 alone, as a hybrid query without an embedding is.
    /// Candidates carrying no raw score at all yield `None`.
    pub fn rescale(&self, raw: &[RawScores], query_type: QueryType) -> Vec<Option<f32>> {
        let best = |pick: fn(&RawScores) -> Option<f32>| {
            raw.iter()
                .filter_map(pick)
                .filter(|s| s.is_finite())
                .fold(0.0_f32, f32::max)
        };
        let max_bm25 = best(|r| r.bm25);
        let max_vector = best(|r| r.vector);
        let has_vector = raw.iter().any(|r| r.vector.is_some());

        let scale = |score: Option<f32>, max: f32| {
            if max > 0.0 {
                score.unwrap_or(0.0).max(0.0) / max
            } else {
                0.0
            }
        };

        raw.iter()
            .map(|r| {
                if r.bm25.is_none() && r.vector.is_none() {
                    return None;
                }
                let score = match query_type.resolve() {
                    QueryType::Vector => r.vector.unwrap_or(0.0).max(0.0),
                    QueryType::Hybrid if has_vector => {
                        self.bm25_weight * scale(r.bm25, max_bm25)
                            + self.vector_weight * scale(r.vector, max_vector)
                    }
                    _ => scale(r.bm25, max_bm25),
                };
                Some(score.min(1.0))
            })
            .collect()
    }
}

impl Default for HybridRanker {
    fn default() -> Self {
        let config = RankerConfig::default();
        let mut ranker = Self {
            bm25_weight: config.bm25_weight,
            vector_weight: config.vector_weight,
        };
        ranker.normalize_weights();
        ranker
    }
}

/// Rescale scores into `[0, 1]` by dividing by the best one.
///
/// Negative scores are clamped to 0 first. When nothing scores above zero
/// every document gets 0.
pub fn normalize_scores(scores: &HashMap<String, f32>) -> HashMap<String, f32> {
    let max = scores
        .values()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0_f32, f32::max);

    scores
        .iter()
        .map(|(id, score)| {
            let normalized = if max > 0.0 {
                score.max(0.0) / max
            } else {
                0.0
            };
            (id.clone(), normalized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(entries: &[(&str, f32)]) -> HashMap<String, f32> {
        entries
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect()
    }

    #[test]
    fn test_weights_are_normalized() {
        let ranker = HybridRanker::try_new(&RankerConfig {
            bm25_weight: 2.0,
            vector_weight: 2.0,
        })
        .unwrap();
        assert!((ranker.bm25_weight() - 0.5).abs() < 0.0001);
        assert!((ranker.vector_weight() - 0.5).abs() < 0.0001);

        let ranker = HybridRanker::try_new(&RankerConfig {
            bm25_weight: 3.0,
            vector_weight: 1.0,
        })
        .unwrap();
        assert!((ranker.bm25_weight() - 0.75).abs() < 0.0001);
    }

    #[test]
    fn test_invalid_weights() {
        assert!(
            HybridRanker::try_new(&RankerConfig {
                bm25_weight: -1.0,
                vector_weight: 1.0,
            })
            .is_err()
        );
        assert!(
            HybridRanker::try_new(&RankerConfig {
                bm25_weight: 0.0,
                vector_weight: 0.0,
            })
            .is_err()
        );
        assert!(
            HybridRanker::try_new(&RankerConfig {
                bm25_weight: f32::NAN,
                vector_weight: 1.0,
            })
            .is_err()
        );
    }

    #[test]
    fn test_normalize_scores() {
        let normalized = normalize_scores(&scores(&[("a", 4.0), ("b", 2.0), ("c", -1.0)]));
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["b"], 0.5);
        assert_eq!(normalized["c"], 0.0);

        let all_negative = normalize_scores(&scores(&[("a", -0.3)]));
        assert_eq!(all_negative["a"], 0.0);
    }

    #[test]
    fn test_combine_stays_within_unit_interval() {
        let ranker = HybridRanker::try_new(&RankerConfig::default()).unwrap();
        let combined = ranker.combine(
            &scores(&[("a", 12.0), ("b", 3.0)]),
            &scores(&[("a", 0.9), ("c", 0.45)]),
        );

        assert!((combined["a"] - 1.0).abs() < 1e-6);
        assert!((combined["b"] - 0.125).abs() < 1e-6);
        assert!((combined["c"] - 0.25).abs() < 1e-6);
        assert!(combined.values().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_rescale_uses_the_best_raw_score_of_the_merged_set() {
        let ranker = HybridRanker::default();
        let raw = [
            RawScores {
                bm25: Some(0.3),
                vector: None,
            },
            RawScores {
                bm25: Some(1.2),
                vector: None,
            },
            RawScores::default(),
        ];

        let scores = ranker.rescale(&raw, QueryType::Bm25);
        assert!((scores[0].unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(scores[1], Some(1.0));
        assert_eq!(scores[2], None);

        // no vector scores anywhere: hybrid ranks lexically
        assert_eq!(ranker.rescale(&raw, QueryType::Default), scores);

        let blended = ranker.rescale(
            &[
                RawScores {
                    bm25: Some(2.0),
                    vector: Some(0.4),
                },
                RawScores {
                    bm25: None,
                    vector: Some(0.8),
                },
            ],
            QueryType::Hybrid,
        );
        assert!((blended[0].unwrap() - 0.75).abs() < 1e-6);
        assert!((blended[1].unwrap() - 0.5).abs() < 1e-6);
    }
}
