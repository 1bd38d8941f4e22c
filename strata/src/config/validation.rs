//! Configuration validation utilities.
//!
//! This module provides validation functions for configuration values.

use super::ConfigError;
use super::models::*;

/// Validate the entire configuration.
pub fn validate_config(config: &StrataConfig) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_search_config(&config.search)?;
    validate_episodic_config(&config.episodic)?;
    validate_decay_config(&config.decay)?;
    validate_maintenance_config(&config.maintenance)?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.max_records_per_tenant == Some(0) {
        return Err(ConfigError::ValidationError(
            "max_records_per_tenant must be greater than 0 when set".to_string(),
        ));
    }
    Ok(())
}

/// Validate search configuration.
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !config.bm25.k1.is_finite() || config.bm25.k1 < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "bm25.k1 must be >= 0.0, got {}",
            config.bm25.k1
        )));
    }
    if !(0.0..=1.0).contains(&config.bm25.b) {
        return Err(ConfigError::ValidationError(format!(
            "bm25.b must be within [0, 1], got {}",
            config.bm25.b
        )));
    }

    let ranker = &config.ranker;
    if ranker.bm25_weight < 0.0 || ranker.vector_weight < 0.0 {
        return Err(ConfigError::ValidationError(
            "ranker weights must be >= 0.0".to_string(),
        ));
    }
    if ranker.bm25_weight + ranker.vector_weight <= 0.0 {
        return Err(ConfigError::ValidationError(
            "at least one ranker weight must be positive".to_string(),
        ));
    }

    if config.default_limit == 0 {
        return Err(ConfigError::ValidationError(
            "search.default_limit must be greater than 0".to_string(),
        ));
    }
    if config.index_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "search.index_batch_size must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_episodic_config(config: &EpisodicConfig) -> Result<(), ConfigError> {
    if config.gap_window.is_zero() {
        return Err(ConfigError::ValidationError(
            "episodic.gap_window must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Validate decay coefficients. Negative rates or weights would break the
/// guarantee that decay never increases over time.
fn validate_decay_config(config: &DecayConfig) -> Result<(), ConfigError> {
    let coefficients = [
        ("core_rate", config.core_rate),
        ("semantic_rate", config.semantic_rate),
        ("procedural_rate", config.procedural_rate),
        ("episodic_rate", config.episodic_rate),
        ("critical_multiplier", config.critical_multiplier),
        ("high_multiplier", config.high_multiplier),
        ("medium_multiplier", config.medium_multiplier),
        ("low_multiplier", config.low_multiplier),
        ("age_weight", config.age_weight),
        ("recency_weight", config.recency_weight),
        ("access_weight", config.access_weight),
    ];

    for (name, value) in coefficients {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "decay.{} must be a finite value >= 0.0, got {}",
                name, value
            )));
        }
    }

    let total_weight = config.age_weight + config.recency_weight + config.access_weight;
    if total_weight <= 0.0 {
        return Err(ConfigError::ValidationError(
            "decay weights must not all be zero".to_string(),
        ));
    }

    if config.access_saturation == 0 {
        return Err(ConfigError::ValidationError(
            "decay.access_saturation must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_maintenance_config(config: &MaintenanceConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.cleanup_threshold) {
        return Err(ConfigError::ValidationError(format!(
            "maintenance.cleanup_threshold must be within [0, 1], got {}",
            config.cleanup_threshold
        )));
    }
    if config.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "maintenance.batch_size must be greater than 0".to_string(),
        ));
    }
    if config.sweep_interval.is_zero() {
        return Err(ConfigError::ValidationError(
            "maintenance.sweep_interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
