use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::board::ScheduledExpiry;
use crate::config::{FeedConfig, FeedMode};

pub const FEED_CHANNEL_CAPACITY: usize = 1024;

/// Timer output. Timers only hold the sending half of the feed channel;
/// the board itself stays with the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Incoming,
    Flush,
    ExpireFlash { symbol: String, revision: u64 },
}

/// Owns every timer driving the simulated feed. Dropping or shutting the
/// driver down cancels them all.
pub struct FeedDriver {
    tx: mpsc::Sender<FeedEvent>,
    periodic: Vec<JoinHandle<()>>,
    expiries: JoinSet<()>,
    expiry_delay: Duration,
}

impl FeedDriver {
    pub fn start(config: &FeedConfig, tx: mpsc::Sender<FeedEvent>) -> FeedDriver {
        let mut periodic = vec![spawn_ticker(config.incoming, FeedEvent::Incoming, tx.clone())];
        if config.mode == FeedMode::Batched {
            periodic.push(spawn_ticker(config.flush, FeedEvent::Flush, tx.clone()));
        }
        tracing::info!(
            mode = ?config.mode,
            incoming_ms = config.incoming.as_millis() as u64,
            flush_ms = config.flush.as_millis() as u64,
            "feed timers started"
        );
        FeedDriver {
            tx,
            periodic,
            expiries: JoinSet::new(),
            expiry_delay: config.expiry_delay(),
        }
    }

    /// Arms a one-shot timer clearing the flash of `expiry` once the delay elapses.
    pub fn schedule_expiry(&mut self, expiry: ScheduledExpiry) {
        self.reap();
        let tx = self.tx.clone();
        let delay = self.expiry_delay;
        self.expiries.spawn(async move {
            tokio::time::sleep(delay).await;
            // A dropped expiry only leaves a stale change set; the flash
            // window itself is time based.
            let _ = tx.try_send(FeedEvent::ExpireFlash {
                symbol: expiry.symbol,
                revision: expiry.revision,
            });
        });
    }

    /// Number of timers not yet finished.
    pub fn active_timers(&mut self) -> usize {
        self.reap();
        self.periodic.iter().filter(|handle| !handle.is_finished()).count() + self.expiries.len()
    }

    pub fn shutdown(&mut self) {
        if self.periodic.is_empty() && self.expiries.is_empty() {
            return;
        }
        for handle in self.periodic.drain(..) {
            handle.abort();
        }
        self.expiries.abort_all();
        tracing::info!("feed timers cancelled");
    }

    fn reap(&mut self) {
        while let Some(result) = self.expiries.try_join_next() {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    tracing::debug!(error = %err, "flash expiry task failed");
                }
            }
        }
    }
}

impl Drop for FeedDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_ticker(period: Duration, event: FeedEvent, tx: mpsc::Sender<FeedEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                // Event loop is behind; drop this tick.
                Err(TrySendError::Full(_)) => continue,
                Err(TrySendError::Closed(_)) => break,
            }
        }
    })
}
