//! Background freshness check.
//!
//! # Responsibilities
//! - Periodically re-judge the stored token
//! - Invalidate it once it expires, so callers stop looking authenticated
//!   even while no request is in flight

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::session::invalidator::SessionInvalidator;
use crate::session::store::InvalidationReason;

#[derive(Clone)]
pub struct FreshnessMonitor {
    invalidator: SessionInvalidator,
    interval: Duration,
}

impl FreshnessMonitor {
    pub fn new(invalidator: SessionInvalidator, interval: Duration) -> Self {
        Self {
            invalidator,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Session freshness monitor starting");

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let monitor = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || monitor.check()).await {
                        tracing::error!(error = %e, "Freshness check task failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Freshness monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Judge the stored token once. Returns true if this call invalidated it.
    pub fn check(&self) -> bool {
        let session = self.invalidator.store().snapshot();
        match session.token.as_deref() {
            Some(_) if session.is_authenticated() => false,
            Some(_) => {
                tracing::info!("Stored token expired");
                self.invalidator.invalidate(InvalidationReason::Expired)
            }
            None => false,
        }
    }
}
