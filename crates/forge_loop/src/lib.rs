//! Fixed-tick loop engine: a [`NormalLoop`] for per-message cooperative
//! dispatch and a [`FrameSyncLoop`] for deterministic per-tick frame
//! assembly, both dynamically retunable via [`NormalLoop::set_frequency`] /
//! [`FrameSyncLoop::set_frequency`].

mod error;
mod frame_sync;
mod handle;
mod message;
mod normal;
mod processor;
mod ticker;

pub use error::Error;
pub use frame_sync::{FrameSyncLoop, FrameSyncLoopConf};
pub use handle::LoopHandle;
pub use message::{Frame, Message};
pub use normal::{NormalLoop, NormalLoopConf};
pub use processor::{FrameProcessor, Processor};
