use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::player::Player;

/// Owns the live player set and forwards broadcast traffic to each member's
/// [`crate::Agent`].
pub struct PlayerManager<D> {
    players: RwLock<HashMap<String, Arc<Player<D>>>>,
}

impl<D> Default for PlayerManager<D> {
    fn default() -> Self {
        Self { players: RwLock::new(HashMap::new()) }
    }
}

impl<D: Send + Sync + 'static> PlayerManager<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, player: Arc<Player<D>>) {
        self.players.write().insert(player.id.clone(), player);
    }

    pub fn remove(&self, player_id: &str) -> Option<Arc<Player<D>>> {
        self.players.write().remove(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<Arc<Player<D>>> {
        self.players.read().get(player_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<Player<D>>> {
        self.players.read().values().cloned().collect()
    }

    /// Writes `payload` to every registered player.
    pub async fn broadcast(&self, payload: Vec<u8>) {
        for player in self.snapshot() {
            player.agent.write(payload.clone()).await;
        }
    }

    /// Writes `payload` to every registered player other than `except_id`.
    pub async fn broadcast_except(&self, except_id: &str, payload: Vec<u8>) {
        for player in self.snapshot() {
            if player.id != except_id {
                player.agent.write(payload.clone()).await;
            }
        }
    }

    /// Writes `payload` to exactly the players named in `ids`, skipping ids
    /// with no registered player.
    pub async fn broadcast_by_ids(&self, ids: &[String], payload: Vec<u8>) {
        let players = self.players.read();
        let targets: Vec<_> = ids.iter().filter_map(|id| players.get(id).cloned()).collect();
        drop(players);
        for player in targets {
            player.agent.write(payload.clone()).await;
        }
    }

    /// Writes a per-player payload computed by `payload_fn` to every
    /// registered player.
    pub async fn broadcast_by_fn(&self, payload_fn: impl Fn(&Player<D>) -> Vec<u8>) {
        for player in self.snapshot() {
            let payload = payload_fn(&player);
            player.agent.write(payload).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    struct RecordingAgent {
        received: Arc<SyncMutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        async fn write(&self, payload: Vec<u8>) {
            self.received.lock().push(payload);
        }
        async fn write_with_code(&self, _code: u16, _payload: Vec<u8>) {}
        async fn close(&self) {}
        async fn destroy(&self) {}
    }

    fn agent() -> (Arc<RecordingAgent>, Arc<SyncMutex<Vec<Vec<u8>>>>) {
        let received = Arc::new(SyncMutex::new(Vec::new()));
        (Arc::new(RecordingAgent { received: received.clone() }), received)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_player() {
        let manager = PlayerManager::<()>::new();
        let (a1, r1) = agent();
        let (a2, r2) = agent();
        manager.add(Arc::new(Player::new("p1", (), a1)));
        manager.add(Arc::new(Player::new("p2", (), a2)));

        manager.broadcast(b"hi".to_vec()).await;

        assert_eq!(r1.lock().as_slice(), [b"hi".to_vec()]);
        assert_eq!(r2.lock().as_slice(), [b"hi".to_vec()]);
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_named_player() {
        let manager = PlayerManager::<()>::new();
        let (a1, r1) = agent();
        let (a2, r2) = agent();
        manager.add(Arc::new(Player::new("p1", (), a1)));
        manager.add(Arc::new(Player::new("p2", (), a2)));

        manager.broadcast_except("p1", b"hi".to_vec()).await;

        assert!(r1.lock().is_empty());
        assert_eq!(r2.lock().as_slice(), [b"hi".to_vec()]);
    }

    #[tokio::test]
    async fn broadcast_by_ids_targets_a_subset() {
        let manager = PlayerManager::<()>::new();
        let (a1, r1) = agent();
        let (a2, r2) = agent();
        manager.add(Arc::new(Player::new("p1", (), a1)));
        manager.add(Arc::new(Player::new("p2", (), a2)));

        manager.broadcast_by_ids(&["p2".to_string()], b"hi".to_vec()).await;

        assert!(r1.lock().is_empty());
        assert_eq!(r2.lock().as_slice(), [b"hi".to_vec()]);
    }
}
