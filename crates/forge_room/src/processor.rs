use async_trait::async_trait;

/// Membership callbacks a [`crate::Room`] invokes on `Join`/`Leave`.
#[async_trait]
pub trait RoomProcessor: Send + Sync {
    /// Invoked after a player is inserted into the member set. Returning an
    /// error undoes the insertion.
    async fn join(&self, player_id: &str) -> anyhow::Result<()>;
    /// Invoked after a player is removed from the member set.
    async fn leave(&self, player_id: &str) -> anyhow::Result<()>;
}
