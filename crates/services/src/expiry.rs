use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::clock::{Clock, shift_back};
use crate::dao::base::DaoResult;
use crate::dao::MessageStore;

/// Background task deleting messages older than the TTL. Required for stores
/// without native expiry; a harmless backstop for MongoDB's TTL monitor.
pub struct ExpirySweeper {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            interval,
        }
    }

    pub async fn sweep_once(&self) -> DaoResult<u64> {
        let cutoff = shift_back(self.clock.now(), self.ttl);
        self.store.delete_created_before(cutoff).await
    }

    /// Runs until the returned handle is aborted. Store errors are logged and
    /// the next tick retries.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs_f64(),
            "Message expiry sweeper started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Expired messages swept"),
                    Err(e) => error!(%e, "Message expiry sweep failed"),
                }
            }
        })
    }
}
