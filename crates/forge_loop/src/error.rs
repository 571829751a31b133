/// Errors surfaced by [`crate::NormalLoop`] and [`crate::FrameSyncLoop`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The input channel is at `max_queue_size`.
    #[error("loop input queue is full")]
    QueueFull,
    /// The loop has not been started, or has already been stopped.
    #[error("loop is not running")]
    NotRunning,
    /// `start` was called on a loop that is already running.
    #[error("loop is already running")]
    AlreadyRunning,
    /// The sender is not in the frame-sync loop's registered player set.
    #[error("sender is not registered with this loop")]
    NotRegistered,
    /// A pending slot already holds a frame at or ahead of the incoming one.
    #[error("a newer or equal frame is already pending for this player")]
    StaleOrDuplicate,
    /// `frame_id` is at or behind the loop's current frame counter.
    #[error("frame_id is at or behind the loop's current frame")]
    PastFrame,
}
