//! Concurrent execution substrate for a real-time game-server framework:
//! recyclable bounded containers, mailboxes, supervised actors, an event
//! bus, tick-driven loop engines, rooms, matchmaking, players, and the
//! process-wide module runner.
//!
//! Each concern lives in its own crate; this crate re-exports them under one
//! namespace for callers that want the whole substrate.

pub use forge_actor as actor;
pub use forge_collections as collections;
pub use forge_eventbus as eventbus;
pub use forge_loop as game_loop;
pub use forge_mailbox as mailbox;
pub use forge_match as matchmaking;
pub use forge_player as player;
pub use forge_room as room;
pub use forge_runner as runner;
