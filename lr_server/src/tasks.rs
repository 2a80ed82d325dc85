//! Background sweeps.
//!
//! Two periodic tasks run next to the HTTP server:
//! - the broadcast sweep re-attempts live updates that were never delivered
//! - the auto-calculation sweep recomputes keys whose interval has elapsed

use chrono::Utc;
use live_ranking::RankingEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::{logging, metrics};

/// Spawn the pending-update broadcast sweep.
pub fn spawn_broadcast_sweep(engine: Arc<RankingEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let started = Instant::now();
            match engine.broadcast_pending().await {
                Ok(report) => {
                    metrics::broadcast_sweep(&report);
                    if report.attempted > 0 {
                        log::info!(
                            "Broadcast sweep: {} delivered, {} failed, {} abandoned",
                            report.delivered,
                            report.failed,
                            report.abandoned
                        );
                    }
                    logging::log_performance(
                        "broadcast_sweep",
                        started.elapsed().as_millis() as u64,
                        None,
                    );
                }
                Err(e) => log::error!("Broadcast sweep failed: {e}"),
            }
        }
    })
}

/// Spawn the auto-calculation sweep.
pub fn spawn_auto_calculation_sweep(
    engine: Arc<RankingEngine>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let started = Instant::now();
            match engine.run_auto_calculation_sweep(Utc::now()).await {
                Ok(report) => {
                    metrics::auto_calculation_sweep(&report);
                    if report.recomputed > 0 || report.failed > 0 {
                        log::info!(
                            "Auto-calculation sweep: {} checked, {} recomputed, {} failed",
                            report.checked,
                            report.recomputed,
                            report.failed
                        );
                    }
                    logging::log_performance(
                        "auto_calculation_sweep",
                        started.elapsed().as_millis() as u64,
                        None,
                    );
                }
                Err(e) => log::error!("Auto-calculation sweep failed: {e}"),
            }
        }
    })
}
