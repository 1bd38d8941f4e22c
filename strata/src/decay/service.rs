//! Decay computation, prediction, statistics and cleanup advice

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{DecayConfig, MaintenanceConfig, StrataConfig};
use crate::models::{Importance, MemoryRecord};
use crate::{Result, StrataError};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Decay factor at or above which a record counts as healthy
pub const HEALTHY_THRESHOLD: f64 = 0.7;
/// Decay factor below which a record counts as decaying
pub const DECAYING_THRESHOLD: f64 = 0.4;

/// Inputs and terms of one decay computation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecayFactors {
    pub base_rate: f64,
    pub importance_multiplier: f64,
    pub effective_rate: f64,
    pub age_days: f64,
    pub days_since_access: f64,
    pub access_count: u64,
    pub age_term: f64,
    pub recency_term: f64,
    pub access_term: f64,
}

/// Current and predicted decay of a single record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecayAnalysis {
    pub record_id: String,
    pub current_decay_factor: f64,
    pub predicted_decay_factor: f64,
    pub prediction_days: f64,
    /// Breakdown of the current factor
    pub factors: DecayFactors,
    pub recommendations: Vec<String>,
}

/// Count and average decay of a group of records
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecayBreakdown {
    pub count: usize,
    pub average_decay: f64,
}

/// Aggregate decay figures over a set of records
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecayStatistics {
    pub total_records: usize,
    pub average_decay: f64,
    pub min_decay: f64,
    pub max_decay: f64,
    /// decay factor >= 0.7
    pub healthy: usize,
    /// 0.4 <= decay factor < 0.7
    pub aging: usize,
    /// decay factor < 0.4
    pub decaying: usize,
    pub by_memory_type: BTreeMap<String, DecayBreakdown>,
    pub by_importance: BTreeMap<String, DecayBreakdown>,
    /// Records ignored because their decay factor was not a finite number
    pub skipped: usize,
}

/// Retention model of the memory system.
///
/// The service never deletes anything; it computes factors, predicts their
/// evolution and tells callers which records are worth dropping.
#[derive(Debug, Clone)]
pub struct MemoryDecayService {
    config: DecayConfig,
    cleanup_threshold: f64,
    batch_size: usize,
}

impl MemoryDecayService {
    pub fn new(config: &StrataConfig) -> Self {
        Self::with_config(config.decay.clone(), &config.maintenance)
    }

    pub fn with_config(config: DecayConfig, maintenance: &MaintenanceConfig) -> Self {
        Self {
            config,
            cleanup_threshold: maintenance.cleanup_threshold,
            batch_size: maintenance.batch_size.max(1),
        }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    pub fn cleanup_threshold(&self) -> f64 {
        self.cleanup_threshold
    }

    fn factors_at(&self, record: &MemoryRecord, now: DateTime<Utc>) -> DecayFactors {
        let base_rate = self.config.base_rate(record.memory_type);
        let importance_multiplier = self.config.importance_multiplier(record.importance);
        let effective_rate = base_rate * importance_multiplier;

        let days_between = |from: DateTime<Utc>| {
            ((now - from).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY).max(0.0)
        };
        let age_days = days_between(record.created_at);
        let days_since_access = days_between(record.last_activity());

        let saturation = (1.0 + self.config.access_saturation.max(1) as f64).ln();
        let access_term = ((1.0 + record.access_count as f64).ln() / saturation).min(1.0);

        DecayFactors {
            base_rate,
            importance_multiplier,
            effective_rate,
            age_days,
            days_since_access,
            access_count: record.access_count,
            age_term: (-effective_rate * age_days).exp(),
            recency_term: (-effective_rate * days_since_access).exp(),
            access_term,
        }
    }

    fn combine(&self, factors: &DecayFactors) -> f64 {
        let value = self.config.age_weight * factors.age_term
            + self.config.recency_weight * factors.recency_term
            + self.config.access_weight * factors.access_term;
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Decay factor of a record right now
    pub fn calculate_decay_factor(&self, record: &MemoryRecord) -> f64 {
        self.calculate_decay_factor_at(record, Utc::now())
    }

    /// Decay factor of a record at a given instant, in `[0, 1]`
    pub fn calculate_decay_factor_at(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        self.combine(&self.factors_at(record, now))
    }

    /// Compare the current factor with the one expected after `prediction_days`
    /// without any further access
    pub fn analyze_decay(&self, record: &MemoryRecord, prediction_days: f64) -> Result<DecayAnalysis> {
        if !prediction_days.is_finite() || prediction_days < 0.0 {
            return Err(StrataError::Validation(format!(
                "prediction days must be a non-negative number, got {}",
                prediction_days
            )));
        }

        let now = Utc::now();
        let later = Duration::try_milliseconds((prediction_days * SECONDS_PER_DAY * 1000.0) as i64)
            .and_then(|horizon| now.checked_add_signed(horizon))
            .ok_or_else(|| {
                StrataError::Validation(format!(
                    "prediction horizon of {} days is out of range",
                    prediction_days
                ))
            })?;
        let factors = self.factors_at(record, now);
        let current = self.combine(&factors);
        let predicted = self.calculate_decay_factor_at(record, later);

        let mut recommendations = Vec::new();
        if record.importance >= Importance::High && predicted < 0.5 {
            recommendations.push(format!(
                "Boost importance: {} memory predicted to fall to {:.2}",
                record.importance, predicted
            ));
        }
        if predicted < self.cleanup_threshold {
            recommendations.push(format!(
                "Cleanup candidate: predicted decay {:.2} is below the cleanup threshold {:.2}",
                predicted, self.cleanup_threshold
            ));
        }
        if current - predicted > 0.2 {
            recommendations.push(format!(
                "Review: decay drops by {:.2} over {} days",
                current - predicted,
                prediction_days
            ));
        }
        if record.access_count == 0 {
            recommendations.push("Never accessed since creation".to_string());
        }

        Ok(DecayAnalysis {
            record_id: record.id.clone(),
            current_decay_factor: current,
            predicted_decay_factor: predicted,
            prediction_days,
            factors,
            recommendations,
        })
    }

    /// Recompute the decay factor of every record in place
    pub fn update_decay_factors(&self, records: &mut [MemoryRecord]) -> HashMap<String, f64> {
        let now = Utc::now();
        records
            .iter_mut()
            .map(|record| {
                let factor = self.calculate_decay_factor_at(record, now);
                record.set_decay_factor(factor);
                (record.id.clone(), record.decay_factor)
            })
            .collect()
    }

    /// Like [`Self::update_decay_factors`], checking `cancel` between batches
    pub async fn update_decay_factors_cancellable(
        &self,
        records: &mut [MemoryRecord],
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, f64>> {
        let now = Utc::now();
        let mut factors = HashMap::with_capacity(records.len());

        for batch in records.chunks_mut(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(StrataError::Cancelled(format!(
                    "decay update after {} records",
                    factors.len()
                )));
            }
            for record in batch.iter_mut() {
                let factor = self.calculate_decay_factor_at(record, now);
                record.set_decay_factor(factor);
                factors.insert(record.id.clone(), record.decay_factor);
            }
            tokio::task::yield_now().await;
        }

        debug!(updated = factors.len(), "Decay factors recomputed");
        Ok(factors)
    }

    /// Records whose stored decay factor is below `threshold`
    pub fn get_decaying_records(&self, records: &[MemoryRecord], threshold: f64) -> Vec<MemoryRecord> {
        records
            .iter()
            .filter(|r| r.decay_factor.is_finite() && r.decay_factor < threshold)
            .cloned()
            .collect()
    }

    /// Records below the cleanup threshold, most decayed first.
    ///
    /// Critical records are never suggested. This is advice only; nothing is deleted.
    pub fn suggest_cleanup_candidates(&self, records: &[MemoryRecord]) -> Vec<MemoryRecord> {
        let mut candidates: Vec<MemoryRecord> = self
            .get_decaying_records(records, self.cleanup_threshold)
            .into_iter()
            .filter(|r| r.importance != Importance::Critical)
            .collect();
        candidates.sort_by(|a, b| {
            a.decay_factor
                .total_cmp(&b.decay_factor)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        candidates
    }

    /// Raise a record's decay factor by `boost`, capped at 1.0. Returns the new factor.
    pub fn boost_memory_importance(&self, record: &mut MemoryRecord, boost: f64) -> Result<f64> {
        if !boost.is_finite() || boost < 0.0 {
            return Err(StrataError::Validation(format!(
                "boost must be a non-negative number, got {}",
                boost
            )));
        }
        record.set_decay_factor(record.decay_factor + boost);
        Ok(record.decay_factor)
    }

    /// Aggregate the stored decay factors of a set of records
    pub fn get_decay_statistics(&self, records: &[MemoryRecord]) -> DecayStatistics {
        let mut stats = DecayStatistics {
            min_decay: f64::INFINITY,
            max_decay: f64::NEG_INFINITY,
            ..Default::default()
        };
        let mut sum = 0.0;
        let mut by_type: BTreeMap<String, (usize, f64)> = BTreeMap::new();
        let mut by_importance: BTreeMap<String, (usize, f64)> = BTreeMap::new();

        for record in records {
            let factor = record.decay_factor;
            if !factor.is_finite() {
                stats.skipped += 1;
                continue;
            }

            stats.total_records += 1;
            sum += factor;
            stats.min_decay = stats.min_decay.min(factor);
            stats.max_decay = stats.max_decay.max(factor);
            if factor >= HEALTHY_THRESHOLD {
                stats.healthy += 1;
            } else if factor >= DECAYING_THRESHOLD {
                stats.aging += 1;
            } else {
                stats.decaying += 1;
            }

            let entry = by_type
                .entry(record.memory_type.as_str().to_string())
                .or_default();
            entry.0 += 1;
            entry.1 += factor;
            let entry = by_importance
                .entry(record.importance.as_str().to_string())
                .or_default();
            entry.0 += 1;
            entry.1 += factor;
        }

        if stats.skipped > 0 {
            warn!(skipped = stats.skipped, "Ignored records with non-finite decay factors");
        }
        if stats.total_records == 0 {
            stats.min_decay = 0.0;
            stats.max_decay = 0.0;
            return stats;
        }

        stats.average_decay = sum / stats.total_records as f64;
        let breakdown = |groups: BTreeMap<String, (usize, f64)>| -> BTreeMap<String, DecayBreakdown> {
            groups
                .into_iter()
                .map(|(key, (count, total))| {
                    (
                        key,
                        DecayBreakdown {
                            count,
                            average_decay: total / count as f64,
                        },
                    )
                })
                .collect()
        };
        stats.by_memory_type = breakdown(by_type);
        stats.by_importance = breakdown(by_importance);
        stats
    }
}
