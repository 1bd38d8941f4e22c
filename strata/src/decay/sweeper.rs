//! Background decay sweeper
//!
//! Periodically recomputes decay factors of every registered layer and logs
//! cleanup advice. It never deletes records.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::MemoryDecayService;
use crate::config::MaintenanceConfig;
use crate::manager::{HierarchicalMemoryManager, SweepReport};
use crate::{Result, StrataError};

/// Background task running decay sweeps on an interval
pub struct DecaySweeper {
    manager: Arc<HierarchicalMemoryManager>,
    service: MemoryDecayService,
    sweep_interval: Duration,
    enabled: bool,
    shutdown_token: CancellationToken,
}

impl DecaySweeper {
    pub fn new(
        manager: Arc<HierarchicalMemoryManager>,
        service: MemoryDecayService,
        config: &MaintenanceConfig,
    ) -> Self {
        Self {
            manager,
            service,
            sweep_interval: config.sweep_interval,
            enabled: config.enabled,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown; cancelling it also aborts a sweep in progress
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the sweeper background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the sweep loop until the shutdown token is cancelled
    pub async fn run(&self) {
        if !self.enabled {
            info!("Decay sweeper is disabled");
            return;
        }

        info!(
            tenant = %self.manager.tenant_id(),
            interval_secs = self.sweep_interval.as_secs(),
            "Starting decay sweeper"
        );

        let mut tick = interval(self.sweep_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running decay sweep");
                    match self.sweep_once().await {
                        Ok(report) => {
                            info!(
                                updated = report.updated,
                                skipped = report.skipped,
                                cleanup_candidates = report.cleanup_candidates.len(),
                                "Decay sweep completed"
                            );
                        }
                        Err(StrataError::Cancelled(_)) => {
                            info!("Decay sweep interrupted by shutdown");
                            break;
                        }
                        Err(e) => {
                            warn!("Decay sweep failed: {}", e);
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping decay sweeper");
                    break;
                }
            }
        }

        info!("Decay sweeper stopped");
    }

    /// Run a single sweep now
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        self.manager
            .run_decay_sweep(&self.service, &self.shutdown_token)
            .await
    }
}
