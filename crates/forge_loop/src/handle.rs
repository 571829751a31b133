use async_trait::async_trait;

use crate::error::Error;
use crate::frame_sync::FrameSyncLoop;
use crate::message::Message;
use crate::normal::NormalLoop;

/// The lifecycle and write surface common to [`NormalLoop`] and
/// [`FrameSyncLoop`], letting a caller (e.g. a room) hold either mode behind
/// one handle without committing to which at compile time.
#[async_trait]
pub trait LoopHandle: Send + Sync {
    fn start(&self) -> Result<(), Error>;
    async fn stop(&self);
    async fn write(&self, msg: Message) -> Result<(), Error>;
    fn set_frequency(&self, hz: f64) -> bool;
}

#[async_trait]
impl LoopHandle for NormalLoop {
    fn start(&self) -> Result<(), Error> {
        NormalLoop::start(self)
    }

    async fn stop(&self) {
        NormalLoop::stop(self).await
    }

    async fn write(&self, msg: Message) -> Result<(), Error> {
        NormalLoop::write(self, msg)
    }

    fn set_frequency(&self, hz: f64) -> bool {
        NormalLoop::set_frequency(self, hz)
    }
}

#[async_trait]
impl LoopHandle for FrameSyncLoop {
    fn start(&self) -> Result<(), Error> {
        FrameSyncLoop::start(self)
    }

    async fn stop(&self) {
        FrameSyncLoop::stop(self).await
    }

    async fn write(&self, msg: Message) -> Result<(), Error> {
        FrameSyncLoop::write(self, msg).await
    }

    fn set_frequency(&self, hz: f64) -> bool {
        FrameSyncLoop::set_frequency(self, hz)
    }
}
