/// Errors surfaced by [`crate::Room`] and [`crate::RoomManager`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `write`, or an operation requiring a running room, was called while
    /// stopped.
    #[error("room is not running")]
    NotRunning,
    /// `start` was called on a room that is already running.
    #[error("room is already running")]
    AlreadyRunning,
    /// `join` was called once `members.len() == conf.max_player`.
    #[error("room is full")]
    RoomFull,
    /// `join` was called for a player already in the member set.
    #[error("player already joined this room")]
    AlreadyJoined,
    /// Looked up a room id not present in a [`crate::RoomManager`].
    #[error("room not found")]
    NotFound,
    /// The room processor's `join`/`leave` hook returned an error.
    #[error("room processor error: {0}")]
    Processor(anyhow::Error),
    /// Propagated from the embedded loop's `write`.
    #[error(transparent)]
    Loop(#[from] forge_loop::Error),
}
