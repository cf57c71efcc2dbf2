//! Periodic reclamation of expired reservations.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::ReservationEngine;
use crate::store::InventoryStore;

/// Spawns the expiry sweep as a background task.
///
/// Runs [`ReservationEngine::run_expiry_sweep`] on a fixed period until the
/// shutdown channel fires. Sweep failures are logged; the loop keeps going.
pub fn spawn_expiry_sweep<S>(
    engine: ReservationEngine<S>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: InventoryStore + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.run_expiry_sweep().await {
                        Ok(0) => {}
                        Ok(count) => {
                            tracing::info!(count, "expired reservations reclaimed");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "expiry sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("expiry sweep shutting down");
                    break;
                }
            }
        }
    })
}
