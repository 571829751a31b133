/// Errors surfaced by [`crate::Matcher`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// `enqueue` was called for a player already in the queue.
    #[error("player already in matchmaking queue")]
    PlayerInQueue,
    /// The queue is at `default_queue_size` and no overflow processor is
    /// configured.
    #[error("matchmaking queue is at capacity")]
    MaxQueuePlayer,
    /// `start_matching` was called with a `match_id` already in progress.
    #[error("match is already in progress")]
    AlreadyMatching,
    /// `start_matching`'s deadline elapsed before `num` players were
    /// assembled.
    #[error("match timed out before assembling enough players")]
    MatchTimeout,
    /// `owner_ids.len() > num`.
    #[error("more owners supplied than the requested match size")]
    GtMatchNum,
}
