//! Periodic reclamation of expired tokens.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::application::tokens::TokenService;

/// Spawn the hourly token sweep.
///
/// The sweep only reclaims storage; expired tokens are already rejected at
/// authentication time, so a missed run costs disk, not correctness. The task
/// exits when `shutdown` changes.
pub fn spawn_token_sweep(
    tokens: Arc<TokenService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup does not
        // race a sweep against the rest of initialization.
        interval.tick().await;

        info!(every_secs = every.as_secs(), "token sweep started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("token sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = tokens.sweep_expired().await {
                        error!(error = %err, "token sweep run failed");
                    }
                }
            }
        }
    })
}
