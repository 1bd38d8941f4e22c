//! Configuration builder.
//!
//! This module provides a builder pattern API for creating configurations.

use super::{Result, models::*, validation};
use std::path::Path;
use std::time::Duration;

/// Builder for creating StrataConfig instances.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: StrataConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: StrataConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: StrataConfig) -> Self {
        Self { config }
    }

    /// Cap the number of records one tenant may hold per layer store.
    pub fn with_max_records_per_tenant(mut self, max: usize) -> Self {
        self.config.storage.max_records_per_tenant = Some(max);
        self
    }

    /// Set the BM25 parameters.
    pub fn with_bm25(mut self, k1: f32, b: f32) -> Self {
        self.config.search.bm25 = Bm25Config { k1, b };
        self
    }

    /// Set the hybrid ranker weights.
    pub fn with_ranker_weights(mut self, bm25_weight: f32, vector_weight: f32) -> Self {
        self.config.search.ranker = RankerConfig {
            bm25_weight,
            vector_weight,
        };
        self
    }

    /// Set the default search limit.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.config.search.default_limit = limit;
        self
    }

    /// Set the episode gap window.
    pub fn with_episode_gap(mut self, gap: Duration) -> Self {
        self.config.episodic.gap_window = gap;
        self
    }

    /// Replace the decay coefficients.
    pub fn with_decay(mut self, decay: DecayConfig) -> Self {
        self.config.decay = decay;
        self
    }

    /// Set the cleanup threshold.
    pub fn with_cleanup_threshold(mut self, threshold: f64) -> Self {
        self.config.maintenance.cleanup_threshold = threshold;
        self
    }

    /// Configure the background decay sweep.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance.sweep_interval = interval;
        self
    }

    /// Set the maintenance batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.maintenance.batch_size = batch_size;
        self
    }

    /// Disable the background decay sweeper.
    pub fn without_background_sweep(mut self) -> Self {
        self.config.maintenance.enabled = false;
        self
    }

    /// Count search hits as accesses.
    pub fn with_search_access_tracking(mut self, enabled: bool) -> Self {
        self.config.access_tracking.update_on_search = enabled;
        self
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Configure logging to a file.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self.config.logging.stdout = false;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<StrataConfig> {
        validation::validate_config(&self.config)?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
