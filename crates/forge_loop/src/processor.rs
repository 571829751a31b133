use async_trait::async_trait;

use crate::message::{Frame, Message};

/// The per-message callback surface a [`crate::NormalLoop`] dispatches to.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Invoked once per drained message, in drain order.
    async fn process(&self, msg: Message);
    /// Periodic liveness callback, independent of traffic. No-op by default.
    async fn handle_idle(&self) {}
    /// Invoked exactly once when the loop stops.
    async fn close(&self) {}
}

/// The per-tick callback surface a [`crate::FrameSyncLoop`] dispatches to.
#[async_trait]
pub trait FrameProcessor: Send + Sync {
    /// Invoked once per emitted [`Frame`].
    async fn process(&self, frame: Frame);
    /// Periodic liveness callback, independent of traffic. No-op by default.
    async fn handle_idle(&self) {}
    /// Invoked exactly once when the loop stops.
    async fn close(&self) {}
    /// Invoked when a player's input arrives out of sequence order; the
    /// slot is not consumed this tick.
    async fn resend(&self, player_id: String, expected_sequence_id: u64);
}
