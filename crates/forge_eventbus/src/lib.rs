//! A typed publish/subscribe bus with two independent delivery modes: a
//! best-effort bounded channel (drops on a full subscriber) and a durable
//! queue (buffers until consumed). Each mode keeps its own
//! [`parking_lot::RwLock`]-guarded handler registry, so a channel-mode
//! publish never contends with a queue-mode subscribe.

mod bus;

pub use bus::{Cancel, EventBus, SubscriptionId};
