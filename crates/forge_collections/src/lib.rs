//! Capacity-managed bounded containers shared across the runtime: a
//! recycler capability, a growable ring buffer, a priority queue, a FIFO
//! queue and a sharded concurrent map.

mod priority;
mod queue;
mod recycler;
mod ring;
mod sharded_map;

pub use priority::{monotonic_ms, PriorityItem, PriorityQueue};
pub use queue::Queue;
pub use recycler::{DefaultRecycler, NoShrink, Recycler};
pub use ring::RingBuffer;
pub use sharded_map::{HashFn, ShardedMap};
