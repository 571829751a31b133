use std::sync::Arc;

use crate::agent::Agent;

/// A heartbeat callback invoked with the player's agent on every tick.
pub type HeartbeatLogic = Arc<dyn Fn(&dyn Agent) + Send + Sync>;

/// A session: an id, opaque application `data`, the network-layer [`Agent`]
/// used to reach the peer, and an optional heartbeat callback.
pub struct Player<D> {
    pub id: String,
    pub data: D,
    pub agent: Arc<dyn Agent>,
    heartbeat_logic: Option<HeartbeatLogic>,
}

/// Type-erased heartbeat target, so a [`crate::HeartbeatManager`] can hold
/// players of differing `data` types in one set.
pub trait Heartbeatable: Send + Sync {
    fn id(&self) -> &str;
    fn heartbeat(&self);
}

impl<D: Send + Sync> Heartbeatable for Player<D> {
    fn id(&self) -> &str {
        &self.id
    }

    fn heartbeat(&self) {
        Player::heartbeat(self)
    }
}

impl<D> Player<D> {
    pub fn new(id: impl Into<String>, data: D, agent: Arc<dyn Agent>) -> Self {
        Self { id: id.into(), data, agent, heartbeat_logic: None }
    }

    pub fn with_heartbeat_logic(mut self, logic: HeartbeatLogic) -> Self {
        self.heartbeat_logic = Some(logic);
        self
    }

    /// Invokes the heartbeat callback with this player's agent, if one is
    /// set. A no-op otherwise.
    pub fn heartbeat(&self) {
        if let Some(logic) = &self.heartbeat_logic {
            logic(self.agent.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopAgent;

    #[async_trait]
    impl Agent for NoopAgent {
        async fn write(&self, _payload: Vec<u8>) {}
        async fn write_with_code(&self, _code: u16, _payload: Vec<u8>) {}
        async fn close(&self) {}
        async fn destroy(&self) {}
    }

    #[test]
    fn heartbeat_without_logic_is_a_noop() {
        let player = Player::new("p1", (), Arc::new(NoopAgent));
        player.heartbeat();
    }

    #[test]
    fn heartbeat_invokes_logic_with_agent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let player = Player::new("p1", (), Arc::new(NoopAgent))
            .with_heartbeat_logic(Arc::new(move |_agent| {
                calls2.fetch_add(1, Ordering::SeqCst);
            }));
        player.heartbeat();
        player.heartbeat();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
