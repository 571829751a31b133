use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::TrySendError;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::message::Message;
use crate::processor::Processor;
use crate::ticker::{make_interval, Retune};

/// Tunables for a [`NormalLoop`].
pub struct NormalLoopConf {
    pub tick_hz: f64,
    pub max_queue_size: usize,
    pub idle_interval: Option<Duration>,
    pub heartbeat_hz: Option<f64>,
    pub idle_handler: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for NormalLoopConf {
    fn default() -> Self {
        Self {
            tick_hz: 20.0,
            max_queue_size: 1024,
            idle_interval: None,
            heartbeat_hz: None,
            idle_handler: None,
        }
    }
}

struct Tasks {
    tick: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

/// Per-message cooperative loop: every tick drains the bounded input channel
/// and hands each message to `processor`, in drain order.
pub struct NormalLoop {
    conf: NormalLoopConf,
    processor: Arc<dyn Processor>,
    input_tx: flume::Sender<Message>,
    input_rx: flume::Receiver<Message>,
    running: AtomicBool,
    stop: Mutex<CancellationToken>,
    retune: Retune,
    tasks: Mutex<Option<Tasks>>,
}

impl NormalLoop {
    pub fn new(conf: NormalLoopConf, processor: Arc<dyn Processor>) -> Self {
        let (input_tx, input_rx) = flume::bounded(conf.max_queue_size.max(1));
        let retune = Retune::new(conf.tick_hz);
        Self {
            conf,
            processor,
            input_tx,
            input_rx,
            running: AtomicBool::new(false),
            stop: Mutex::new(CancellationToken::new()),
            retune,
            tasks: Mutex::new(None),
        }
    }

    /// Non-blocking. Fails with [`Error::QueueFull`] when the input channel
    /// is at capacity, or [`Error::NotRunning`] if the loop isn't started.
    pub fn write(&self, msg: Message) -> Result<(), Error> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }
        match self.input_tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::NotRunning),
        }
    }

    /// Stores the new tick rate and wakes the ticker-monitor task. Rejects
    /// `hz <= 0` and leaves the current rate in place.
    pub fn set_frequency(&self, hz: f64) -> bool {
        self.retune.set(hz)
    }

    /// Spawns the tick task (and, if configured, the heartbeat task).
    /// Rejects with [`Error::AlreadyRunning`] on a second call.
    pub fn start(&self) -> Result<(), Error> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let stop = CancellationToken::new();
        *self.stop.lock() = stop.clone();

        let tick = tokio::spawn(run_tick(
            self.input_rx.clone(),
            self.processor.clone(),
            self.retune.subscribe(),
            self.conf.idle_interval,
            self.conf.idle_handler.clone(),
            stop.clone(),
        ));

        let heartbeat = self.conf.heartbeat_hz.map(|hz| {
            tokio::spawn(run_heartbeat(self.processor.clone(), hz, stop.clone()))
        });

        *self.tasks.lock() = Some(Tasks { tick, heartbeat });
        Ok(())
    }

    /// Idempotent: cancels the running tasks and waits for both to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.lock().cancel();
        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            let _ = tasks.tick.await;
            if let Some(hb) = tasks.heartbeat {
                let _ = hb.await;
            }
        }
    }
}

async fn run_tick(
    input_rx: flume::Receiver<Message>,
    processor: Arc<dyn Processor>,
    mut retune_rx: tokio::sync::watch::Receiver<f64>,
    idle_interval: Option<Duration>,
    idle_handler: Option<Arc<dyn Fn() + Send + Sync>>,
    stop: CancellationToken,
) {
    let mut ticker = make_interval(*retune_rx.borrow());
    let mut last_idle = Instant::now();

    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            res = retune_rx.changed() => {
                if res.is_ok() {
                    ticker = make_interval(*retune_rx.borrow());
                }
                continue;
            }
            _ = ticker.tick() => {
                let mut did_work = false;
                while let Ok(msg) = input_rx.try_recv() {
                    did_work = true;
                    processor.process(msg).await;
                }
                if !did_work {
                    if let Some(interval) = idle_interval {
                        if last_idle.elapsed() >= interval {
                            last_idle = Instant::now();
                            if let Some(handler) = &idle_handler {
                                handler();
                            }
                        }
                    }
                }
            }
        }
    }
    processor.close().await;
}

async fn run_heartbeat(processor: Arc<dyn Processor>, hz: f64, stop: CancellationToken) {
    let mut ticker = make_interval(hz);
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => return,
            _ = ticker.tick() => processor.handle_idle().await,
        }
    }
}
