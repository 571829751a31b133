use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::pid::Pid;

/// The outcome of one [`Worker::step`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No work was available this step; keep running.
    Idle,
    /// Work was processed this step; keep running.
    Running,
    /// The worker is done; the actor's run loop exits after this step.
    Stopped,
}

/// Per-actor context handed to every [`Worker`] callback: its [`Pid`] and a
/// cancellation handle observed at every iteration boundary.
#[derive(Clone)]
pub struct ActorContext {
    pid: Pid,
    cancel: CancellationToken,
}

impl ActorContext {
    pub(crate) fn new(pid: Pid, cancel: CancellationToken) -> Self {
        Self { pid, cancel }
    }

    /// This actor's identity.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Whether the actor has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the actor has been asked to stop. Useful for a worker
    /// that wants to race its own I/O against cancellation.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// The user's unit of computation. Has no identity of its own — identity,
/// scheduling and supervision are all owned by the [`crate::Actor`] wrapping
/// it.
#[async_trait]
pub trait Worker: Send + 'static {
    /// Called once before the first [`Self::step`].
    async fn on_start(&mut self, ctx: &ActorContext) {
        let _ = ctx;
    }

    /// Called repeatedly until it returns [`WorkerState::Stopped`] or the
    /// context is cancelled.
    async fn step(&mut self, ctx: &ActorContext) -> WorkerState;

    /// Called once after the run loop exits, before the `done` signal is
    /// published.
    async fn on_stop(&mut self, ctx: &ActorContext) {
        let _ = ctx;
    }
}
