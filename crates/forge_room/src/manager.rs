use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Error;
use crate::room::RoomHandle;

/// Thread-safe `id -> room` registry. `add` starts a room in the
/// background; `stop` tears every room down and joins those background
/// start tasks.
#[derive(Default)]
pub struct RoomManager {
    rooms: RwLock<HashMap<String, Arc<dyn RoomHandle>>>,
    start_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `room`, then spawns a task running its `start`. Start
    /// errors are logged, not returned.
    pub fn add(&self, room: Arc<dyn RoomHandle>) {
        let id = room.id().to_string();
        self.rooms.write().insert(id.clone(), room.clone());
        let handle = tokio::spawn(async move {
            if let Err(err) = room.start() {
                warn!(room = %id, %err, "room failed to start");
            }
        });
        self.start_tasks.lock().push(handle);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn RoomHandle>> {
        self.rooms.read().get(id).cloned()
    }

    /// Stops and deletes one room.
    pub async fn remove(&self, id: &str) -> Result<(), Error> {
        let room = self.rooms.write().remove(id).ok_or(Error::NotFound)?;
        room.stop().await;
        Ok(())
    }

    /// Stops every room synchronously, clears the registry, then joins the
    /// background start tasks spawned by `add`.
    pub async fn stop(&self) {
        let rooms: Vec<_> = self.rooms.write().drain().map(|(_, room)| room).collect();
        for room in rooms {
            room.stop().await;
        }
        let tasks: Vec<_> = self.start_tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}
