//! Configuration model definitions.
//!
//! This module contains the configuration structures for all Strata components.

use crate::models::{Importance, MemoryType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for Strata.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StrataConfig {
    /// Record store configuration
    pub storage: StorageConfig,

    /// Search engine configuration
    pub search: SearchConfig,

    /// Episodic memory configuration
    pub episodic: EpisodicConfig,

    /// Decay model coefficients
    pub decay: DecayConfig,

    /// Maintenance (decay sweep, cleanup) configuration
    pub maintenance: MaintenanceConfig,

    /// Access tracking configuration
    pub access_tracking: AccessTrackingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Configuration for the bundled record store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum records a single tenant may hold in one store (None = unlimited)
    pub max_records_per_tenant: Option<usize>,
}

/// Search engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// BM25 parameters
    pub bm25: Bm25Config,

    /// Hybrid ranker weights
    pub ranker: RankerConfig,

    /// Result limit used when a caller does not give one
    pub default_limit: usize,

    /// Records processed between cancellation checks during a rebuild
    pub index_batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Config::default(),
            ranker: RankerConfig::default(),
            default_limit: 10,
            index_batch_size: 256,
        }
    }
}

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bm25Config {
    /// Term frequency saturation
    pub k1: f32,

    /// Document length normalization (0 = none, 1 = full)
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Weights of the hybrid ranker.
///
/// Weights are normalized to sum to 1.0 when the ranker is built, so only
/// their ratio matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankerConfig {
    /// Weight for normalized BM25 scores
    pub bm25_weight: f32,

    /// Weight for normalized vector similarity
    pub vector_weight: f32,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.5,
            vector_weight: 0.5,
        }
    }
}

/// Episodic memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EpisodicConfig {
    /// Maximum gap between an event and the last event of the open episode
    /// for the event to join that episode
    #[serde(with = "humantime_serde")]
    pub gap_window: Duration,
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            gap_window: Duration::from_secs(30 * 60),
        }
    }
}

/// Coefficients of the decay model.
///
/// A record's decay factor is
/// `age_weight * exp(-r * age_days) + recency_weight * exp(-r * idle_days) + access_weight * access_term`
/// where `r` is the base rate of its memory type scaled by its importance multiplier
/// and `access_term = min(1, ln(1 + access_count) / ln(1 + access_saturation))`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecayConfig {
    /// Daily decay rate of core records
    pub core_rate: f64,
    /// Daily decay rate of semantic records
    pub semantic_rate: f64,
    /// Daily decay rate of procedural records
    pub procedural_rate: f64,
    /// Daily decay rate of episodic records
    pub episodic_rate: f64,

    /// Rate multiplier for critical records
    pub critical_multiplier: f64,
    /// Rate multiplier for high importance records
    pub high_multiplier: f64,
    /// Rate multiplier for medium importance records
    pub medium_multiplier: f64,
    /// Rate multiplier for low importance records
    pub low_multiplier: f64,

    /// Weight of the age-since-creation term
    pub age_weight: f64,
    /// Weight of the time-since-last-access term
    pub recency_weight: f64,
    /// Weight of the access count term
    pub access_weight: f64,

    /// Access count at which the access term saturates
    pub access_saturation: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            core_rate: 0.01,
            semantic_rate: 0.03,
            procedural_rate: 0.02,
            episodic_rate: 0.08,
            critical_multiplier: 0.25,
            high_multiplier: 0.5,
            medium_multiplier: 1.0,
            low_multiplier: 1.5,
            age_weight: 0.5,
            recency_weight: 0.3,
            access_weight: 0.2,
            access_saturation: 50,
        }
    }
}

impl DecayConfig {
    /// Daily base rate for a memory type
    pub fn base_rate(&self, memory_type: MemoryType) -> f64 {
        match memory_type {
            MemoryType::Core => self.core_rate,
            MemoryType::Semantic => self.semantic_rate,
            MemoryType::Procedural => self.procedural_rate,
            MemoryType::Episodic => self.episodic_rate,
        }
    }

    /// Rate multiplier for an importance level
    pub fn importance_multiplier(&self, importance: Importance) -> f64 {
        match importance {
            Importance::Critical => self.critical_multiplier,
            Importance::High => self.high_multiplier,
            Importance::Medium => self.medium_multiplier,
            Importance::Low => self.low_multiplier,
        }
    }
}

/// Maintenance configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Whether the background decay sweeper runs
    pub enabled: bool,

    /// Records below this decay factor are suggested for cleanup
    pub cleanup_threshold: f64,

    /// Records processed between cancellation checks
    pub batch_size: usize,

    /// Interval between background decay sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_threshold: 0.2,
            batch_size: 500,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

/// Configuration for access tracking.
///
/// Access tracking updates `access_count` and `last_accessed` when records are
/// read, which feeds the recency and access terms of the decay model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessTrackingConfig {
    /// Whether to update access tracking on `get`
    pub update_on_get: bool,

    /// Whether to update access tracking for records returned by a search
    /// (Usually false - searching shouldn't count as accessing)
    pub update_on_search: bool,
}

impl Default for AccessTrackingConfig {
    fn default() -> Self {
        Self {
            update_on_get: true,
            update_on_search: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Log format
    pub format: LogFormat,

    /// File to log to (if any)
    pub file: Option<PathBuf>,

    /// Whether to log to stdout
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
            file: None,
            stdout: true,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,

    /// Debug level
    Debug,

    /// Info level
    Info,

    /// Warn level
    Warn,

    /// Error level
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default format
    Default,

    /// JSON format
    Json,

    /// Compact format
    Compact,

    /// Pretty format
    Pretty,
}
