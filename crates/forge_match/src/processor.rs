use async_trait::async_trait;

/// Optional overflow/notification collaborator for [`crate::Matcher`].
#[async_trait]
pub trait MatchProcessor: Send + Sync {
    /// Called instead of [`crate::Error::MaxQueuePlayer`] when the queue is
    /// full.
    async fn enqueue(&self, player_id: &str);
    /// Polled as a fallback source once the primary queue runs dry.
    async fn dequeue(&self) -> Option<String>;
    /// Invoked once a match's group is fully assembled.
    async fn on_matched(&self, match_id: &str, players: &[String]);
    /// Invoked once a match's deadline elapses without assembling `num`
    /// players.
    async fn on_deadline(&self, match_id: &str);
}
