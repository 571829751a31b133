use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::pid::Pid;
use crate::supervisor::SupervisorHandle;
use crate::worker::{ActorContext, Worker, WorkerState};

/// Something a [`crate::Supervisor`] can start and stop without knowing its
/// concrete worker type.
#[async_trait]
pub trait Restartable: Send + Sync {
    /// This actor's identity.
    fn pid(&self) -> Pid;
    /// Launches the worker loop if it isn't already running. Idempotent.
    fn start(&self);
    /// Requests a stop and waits for the run loop to exit. Idempotent.
    async fn stop(&self);
}

struct Shared<W> {
    pid: Pid,
    worker: AsyncMutex<W>,
    running: AtomicBool,
    cancel: parking_lot::Mutex<CancellationToken>,
    done: parking_lot::Mutex<watch::Receiver<bool>>,
    supervisor: Option<SupervisorHandle>,
}

/// Ties a [`Worker`] to a [`Pid`], a cancellable context, and at most one
/// supervisor. States: `New -> Running -> Stopped` (terminal, but a
/// supervisor may restart the same actor under the same Pid).
pub struct Actor<W> {
    shared: Arc<Shared<W>>,
}

impl<W> Clone for Actor<W> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<W: Worker> Actor<W> {
    pub(crate) fn new(pid: Pid, worker: W, supervisor: Option<SupervisorHandle>) -> Self {
        let (_tx, rx) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                pid,
                worker: AsyncMutex::new(worker),
                running: AtomicBool::new(false),
                cancel: parking_lot::Mutex::new(CancellationToken::new()),
                done: parking_lot::Mutex::new(rx),
                supervisor,
            }),
        }
    }

    /// This actor's identity.
    pub fn pid(&self) -> Pid {
        self.shared.pid
    }

    /// Launches exactly one background task running the worker loop.
    /// Idempotent: a second call while already running is a no-op.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancel = CancellationToken::new();
        *self.shared.cancel.lock() = cancel.clone();

        let (done_tx, done_rx) = watch::channel(false);
        *self.shared.done.lock() = done_rx;

        let shared = self.shared.clone();
        let ctx = ActorContext::new(shared.pid, cancel.clone());

        let handle = tokio::spawn(run_loop(shared.clone(), ctx));

        tokio::spawn(async move {
            let panicked = handle.await.is_err();
            shared.running.store(false, Ordering::SeqCst);
            let _ = done_tx.send(true);

            if panicked {
                warn!(pid = %shared.pid, "actor panicked");
                if let Some(sup) = &shared.supervisor {
                    sup.notify_panic(shared.pid);
                }
            }
        });
    }

    /// Idempotent: requests cancellation and waits for the run loop (if any)
    /// to publish its done signal.
    pub async fn stop(&self) {
        self.shared.cancel.lock().cancel();
        let mut rx = self.shared.done.lock().clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

async fn run_loop<W: Worker>(shared: Arc<Shared<W>>, ctx: ActorContext) {
    let mut worker = shared.worker.lock().await;

    worker.on_start(&ctx).await;

    loop {
        if ctx.is_cancelled() {
            break;
        }
        let state = worker.step(&ctx).await;
        if state == WorkerState::Stopped {
            break;
        }
    }

    worker.on_stop(&ctx).await;
    trace!(pid = %shared.pid, "actor run loop exited");
}

#[async_trait]
impl<W: Worker> Restartable for Actor<W> {
    fn pid(&self) -> Pid {
        self.pid()
    }

    fn start(&self) {
        Actor::start(self)
    }

    async fn stop(&self) {
        Actor::stop(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingWorker {
        steps: Arc<AtomicUsize>,
        stop_after: usize,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        async fn step(&mut self, _ctx: &ActorContext) -> WorkerState {
            let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.stop_after {
                WorkerState::Stopped
            } else {
                WorkerState::Running
            }
        }
    }

    #[tokio::test]
    async fn start_then_start_is_one_start() {
        let steps = Arc::new(AtomicUsize::new(0));
        let actor = Actor::new(
            Pid::from_raw_for_test(1),
            CountingWorker { steps: steps.clone(), stop_after: 1_000_000 },
            None,
        );
        actor.start();
        actor.start();
        actor.stop().await;
        // Regardless of how many steps ran, only one run loop should have
        // executed; we assert indirectly via idempotent stop() returning.
        assert!(steps.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn stop_then_stop_is_one_stop() {
        let steps = Arc::new(AtomicUsize::new(0));
        let actor = Actor::new(
            Pid::from_raw_for_test(2),
            CountingWorker { steps, stop_after: 3 },
            None,
        );
        actor.start();
        actor.stop().await;
        actor.stop().await;
    }

    struct PanicWorker;

    #[async_trait]
    impl Worker for PanicWorker {
        async fn step(&mut self, _ctx: &ActorContext) -> WorkerState {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn panic_is_captured_and_done_still_publishes() {
        let actor = Actor::new(Pid::from_raw_for_test(3), PanicWorker, None);
        actor.start();
        actor.stop().await;
    }
}
