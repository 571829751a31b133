use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::warn;

/// Builds a ticker for `hz`, coalescing any ticks missed while the loop was
/// busy rather than firing a burst of catch-up ticks.
pub(crate) fn make_interval(hz: f64) -> Interval {
    let period = Duration::from_secs_f64(1.0 / hz);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// A 1-slot, non-blocking retune signal: `set` always stores the latest
/// requested rate, and `watch`'s coalescing means a burst of calls only
/// wakes the ticker-monitor task once with the final value.
pub(crate) struct Retune {
    tx: watch::Sender<f64>,
    rx: watch::Receiver<f64>,
}

impl Retune {
    pub(crate) fn new(initial_hz: f64) -> Self {
        let (tx, rx) = watch::channel(initial_hz.max(f64::MIN_POSITIVE));
        Self { tx, rx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<f64> {
        self.rx.clone()
    }

    /// Rejects `hz <= 0`, per the loop engine's retune contract.
    pub(crate) fn set(&self, hz: f64) -> bool {
        if hz <= 0.0 {
            warn!(hz, "rejected retune to a non-positive frequency");
            return false;
        }
        self.tx.send(hz).is_ok()
    }
}
