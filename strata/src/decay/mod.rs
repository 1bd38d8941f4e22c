//! Memory decay
//!
//! Every record carries a decay factor in `[0, 1]` estimating how worth
//! keeping it still is. [`MemoryDecayService`] computes it from the record's
//! layer, importance, age, idle time and access count:
//!
//! ```text
//! r      = base_rate(memory_type) * importance_multiplier(importance)
//! factor = 0.5 * exp(-r * age_days)
//!        + 0.3 * exp(-r * days_since_last_access)
//!        + 0.2 * min(1, ln(1 + access_count) / ln(1 + 50))
//! ```
//!
//! All coefficients come from [`crate::config::DecayConfig`]. The
//! [`DecaySweeper`] applies the model periodically in the background.

pub mod service;
pub mod sweeper;

pub use service::{
    DECAYING_THRESHOLD, DecayAnalysis, DecayBreakdown, DecayFactors, DecayStatistics,
    HEALTHY_THRESHOLD, MemoryDecayService,
};
pub use sweeper::DecaySweeper;
