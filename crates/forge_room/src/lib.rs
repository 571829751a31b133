//! Per-session room lifecycle: a [`Room`] wraps a `forge_loop` engine, a
//! member set, and a [`RoomProcessor`]; a [`RoomManager`] owns a thread-safe
//! `id -> room` registry.

mod error;
mod manager;
mod processor;
mod room;

pub use error::Error;
pub use manager::RoomManager;
pub use processor::RoomProcessor;
pub use room::{Room, RoomConf, RoomHandle};
