use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::player::Heartbeatable;

#[derive(Default)]
struct Registry {
    players: HashMap<String, Arc<dyn Heartbeatable>>,
}

/// Drives periodic liveness callbacks over a registered set of players.
pub struct HeartbeatManager {
    registry: Arc<RwLock<Registry>>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Default for HeartbeatManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatManager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            task: parking_lot::Mutex::new(None),
        }
    }

    pub fn register(&self, player: Arc<dyn Heartbeatable>) {
        self.registry.write().players.insert(player.id().to_string(), player);
    }

    pub fn unregister(&self, player_id: &str) {
        self.registry.write().players.remove(player_id);
    }

    pub fn len(&self) -> usize {
        self.registry.read().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the periodic task. A second call before [`HeartbeatManager::stop`]
    /// replaces the prior task.
    pub fn start(&self, interval: Duration) {
        let registry = self.registry.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let players: Vec<_> = registry.read().players.values().cloned().collect();
                trace!(count = players.len(), "heartbeat tick");
                for player in players {
                    player.heartbeat();
                }
            }
        });
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Idempotent: stops the periodic task (if any) and clears the
    /// registered set.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        self.registry.write().players.clear();
    }
}
