use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use forge_loop::{LoopHandle, Message};
use parking_lot::RwLock;

use crate::error::Error;
use crate::processor::RoomProcessor;

/// Tunables for a [`Room`].
#[derive(Debug, Clone, Copy)]
pub struct RoomConf {
    pub max_player: usize,
}

/// Anything a [`RoomManager`](crate::RoomManager) can hold and drive without
/// knowing the concrete loop mode or user-data type behind it.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    fn id(&self) -> &str;
    async fn join(&self, player_id: &str) -> Result<(), Error>;
    async fn leave(&self, player_id: &str) -> Result<(), Error>;
    fn start(&self) -> Result<(), Error>;
    async fn stop(&self);
    async fn write(&self, msg: Message) -> Result<(), Error>;
}

/// A per-session room: an id, a member set, a membership [`RoomProcessor`],
/// an embedded loop engine, and opaque application `user_data`.
pub struct Room<L, U = ()> {
    id: String,
    conf: RoomConf,
    members: RwLock<HashSet<String>>,
    processor: Arc<dyn RoomProcessor>,
    loop_handle: Arc<L>,
    running: AtomicBool,
    pub user_data: U,
}

impl<L: LoopHandle, U> Room<L, U> {
    pub fn new(
        id: impl Into<String>,
        conf: RoomConf,
        loop_handle: Arc<L>,
        processor: Arc<dyn RoomProcessor>,
        user_data: U,
    ) -> Self {
        Self {
            id: id.into(),
            conf,
            members: RwLock::new(HashSet::new()),
            processor,
            loop_handle,
            running: AtomicBool::new(false),
            user_data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.members.read().contains(player_id)
    }

    /// Inserts `player_id`, then runs the membership processor's `join`
    /// hook; on its error, undoes the insertion.
    pub async fn join(&self, player_id: &str) -> Result<(), Error> {
        {
            let mut members = self.members.write();
            if members.contains(player_id) {
                return Err(Error::AlreadyJoined);
            }
            if members.len() >= self.conf.max_player {
                return Err(Error::RoomFull);
            }
            members.insert(player_id.to_string());
        }

        if let Err(err) = self.processor.join(player_id).await {
            self.members.write().remove(player_id);
            return Err(Error::Processor(err));
        }
        Ok(())
    }

    /// Removes `player_id` and runs the membership processor's `leave`
    /// hook. Fails [`Error::NotFound`] if the player wasn't a member.
    pub async fn leave(&self, player_id: &str) -> Result<(), Error> {
        if !self.members.write().remove(player_id) {
            return Err(Error::NotFound);
        }
        self.processor.leave(player_id).await.map_err(Error::Processor)
    }

    /// Flips the running flag and starts the embedded loop. Rejects a
    /// second call with [`Error::AlreadyRunning`].
    pub fn start(&self) -> Result<(), Error> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }
        if let Err(err) = self.loop_handle.start() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err.into());
        }
        Ok(())
    }

    /// Idempotent: clears the running flag, then stops the embedded loop
    /// (blocking until its ticker task exits and its processor's close hook
    /// has run).
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.loop_handle.stop().await;
    }

    /// Forwards to the embedded loop's write, failing [`Error::NotRunning`]
    /// if the room is stopped.
    pub async fn write(&self, msg: Message) -> Result<(), Error> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }
        self.loop_handle.write(msg).await.map_err(Error::from)
    }
}

#[async_trait]
impl<L: LoopHandle + 'static, U: Send + Sync + 'static> RoomHandle for Room<L, U> {
    fn id(&self) -> &str {
        Room::id(self)
    }

    async fn join(&self, player_id: &str) -> Result<(), Error> {
        Room::join(self, player_id).await
    }

    async fn leave(&self, player_id: &str) -> Result<(), Error> {
        Room::leave(self, player_id).await
    }

    fn start(&self) -> Result<(), Error> {
        Room::start(self)
    }

    async fn stop(&self) {
        Room::stop(self).await
    }

    async fn write(&self, msg: Message) -> Result<(), Error> {
        Room::write(self, msg).await
    }
}
