use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::module::Module;

struct RunningModule {
    module: Arc<dyn Module>,
    done_tx: flume::Sender<()>,
    handle: JoinHandle<()>,
}

/// Orders a fixed set of [`Module`]s through init, run, and reverse-order
/// teardown.
#[derive(Default)]
pub struct Runner {
    modules: Mutex<Vec<Arc<dyn Module>>>,
    running: Mutex<Vec<RunningModule>>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `module` to the registration order. No-op once [`Runner::run`]
    /// has already started the modules.
    pub fn register(&self, module: Arc<dyn Module>) {
        self.modules.lock().push(module);
    }

    /// Calls `init` on every registered module, in registration order, on
    /// the caller's own task.
    pub async fn init(&self) {
        let modules: Vec<_> = self.modules.lock().clone();
        for module in modules {
            module.init().await;
        }
    }

    /// Spawns one task per registered module running `run(done)`.
    pub fn run(&self) {
        let modules: Vec<_> = self.modules.lock().clone();
        let mut running = self.running.lock();
        for module in modules {
            let (done_tx, done_rx) = flume::bounded(1);
            let task_module = module.clone();
            let handle = tokio::spawn(async move {
                task_module.run(done_rx).await;
            });
            running.push(RunningModule { module, done_tx, handle });
        }
    }

    /// Reverse-order shutdown: for each running module, sends on `done`,
    /// waits for its task to exit, then calls `destroy` with panics caught
    /// and logged rather than propagated.
    pub async fn destroy(&self) {
        let running: Vec<_> = self.running.lock().drain(..).collect();
        for RunningModule { module, done_tx, handle } in running.into_iter().rev() {
            let _ = done_tx.send(());
            if handle.await.is_err() {
                warn!("module run task panicked");
            }

            let destroy_module = module.clone();
            let destroy_handle =
                tokio::spawn(async move { destroy_module.destroy().await });
            if destroy_handle.await.is_err() {
                warn!("module destroy panicked");
            }
        }
    }

    /// Blocks until SIGINT or SIGTERM is received, then runs
    /// [`Runner::destroy`].
    #[cfg(unix)]
    pub async fn run_until_signal(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }

        self.destroy().await;
    }
}

/// Assembles a [`Runner`]'s module list before calling [`Runner::init`].
#[derive(Default)]
pub struct Builder {
    modules: Vec<Arc<dyn Module>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn build(self) -> Runner {
        let runner = Runner::new();
        for module in self.modules {
            runner.register(module);
        }
        runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingModule {
        name: &'static str,
        order: Arc<StdMutex<Vec<String>>>,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Module for RecordingModule {
        async fn init(&self) {
            self.order.lock().unwrap().push(format!("init:{}", self.name));
        }

        async fn run(&self, done: flume::Receiver<()>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let _ = done.recv_async().await;
        }

        async fn destroy(&self) {
            self.order.lock().unwrap().push(format!("destroy:{}", self.name));
        }
    }

    #[tokio::test]
    async fn init_runs_in_registration_order() {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let runner = Builder::new()
            .with_module(Arc::new(RecordingModule {
                name: "a",
                order: order.clone(),
                runs: Arc::new(AtomicUsize::new(0)),
            }))
            .with_module(Arc::new(RecordingModule {
                name: "b",
                order: order.clone(),
                runs: Arc::new(AtomicUsize::new(0)),
            }))
            .build();

        runner.init().await;
        assert_eq!(*order.lock().unwrap(), vec!["init:a", "init:b"]);
    }

    #[tokio::test]
    async fn destroy_tears_down_in_reverse_order() {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let runner = Builder::new()
            .with_module(Arc::new(RecordingModule {
                name: "a",
                order: order.clone(),
                runs: Arc::new(AtomicUsize::new(0)),
            }))
            .with_module(Arc::new(RecordingModule {
                name: "b",
                order: order.clone(),
                runs: Arc::new(AtomicUsize::new(0)),
            }))
            .build();

        runner.init().await;
        runner.run();
        runner.destroy().await;

        assert_eq!(
            *order.lock().unwrap(),
            vec!["init:a", "init:b", "destroy:b", "destroy:a"]
        );
    }

    struct PanicOnDestroy;

    #[async_trait]
    impl Module for PanicOnDestroy {
        async fn run(&self, done: flume::Receiver<()>) {
            let _ = done.recv_async().await;
        }

        async fn destroy(&self) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn panic_during_destroy_is_caught_not_propagated() {
        let runner = Builder::new().with_module(Arc::new(PanicOnDestroy)).build();
        runner.run();
        runner.destroy().await;
    }
}
