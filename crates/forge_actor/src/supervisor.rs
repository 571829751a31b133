use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::actor::{Actor, Restartable};
use crate::pid::{Pid, PidAllocator};
use crate::worker::Worker;

/// Restart policy. `max_restarts == 0` means unlimited restarts.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConf {
    pub restart_on_panic: bool,
    pub max_restarts: usize,
    pub time_window: Duration,
}

impl Default for SupervisorConf {
    fn default() -> Self {
        Self {
            restart_on_panic: true,
            max_restarts: 0,
            time_window: Duration::from_secs(5),
        }
    }
}

struct Inner {
    children: RwLock<HashMap<Pid, Arc<dyn Restartable>>>,
    restarts: Mutex<HashMap<Pid, Vec<Instant>>>,
    conf: SupervisorConf,
    pids: PidAllocator,
}

/// Owns a set of children, restarting them under a rate-limited policy when
/// their worker panics.
pub struct Supervisor {
    inner: Arc<Inner>,
}

/// A non-owning reference a child actor holds back to its supervisor, used
/// only to report a panic. Never keeps the supervisor alive.
#[derive(Clone)]
pub struct SupervisorHandle {
    inner: Weak<Inner>,
}

impl Supervisor {
    pub fn new(conf: SupervisorConf) -> Self {
        Self {
            inner: Arc::new(Inner {
                children: RwLock::new(HashMap::new()),
                restarts: Mutex::new(HashMap::new()),
                conf,
                pids: PidAllocator::default(),
            }),
        }
    }

    /// A non-owning handle children use to report panics.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle { inner: Arc::downgrade(&self.inner) }
    }

    /// Assigns a fresh [`Pid`], registers `worker` as a child, starts it, and
    /// returns the [`Actor`] handle.
    pub fn spawn<W: Worker>(&self, worker: W) -> Actor<W> {
        let pid = self.inner.pids.next();
        let actor = Actor::new(pid, worker, Some(self.handle()));
        self.inner
            .children
            .write()
            .insert(pid, Arc::new(actor.clone()));
        actor.start();
        actor
    }

    /// Number of children currently registered (running or stopped, but not
    /// yet removed).
    pub fn child_count(&self) -> usize {
        self.inner.children.read().len()
    }

    /// Stops every child and clears the registry.
    pub async fn stop_all(&self) {
        let children: Vec<_> = self.inner.children.read().values().cloned().collect();
        for child in children {
            child.stop().await;
        }
        self.inner.children.write().clear();
    }
}

impl SupervisorHandle {
    /// Called by a child's monitor task after its worker loop panicked.
    /// Applies the restart-rate-limit policy and, if it survives, restarts
    /// the same child under the same Pid.
    pub(crate) fn notify_panic(&self, pid: Pid) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        if !inner.conf.restart_on_panic {
            return;
        }

        let should_restart = {
            let mut restarts = inner.restarts.lock();
            let now = Instant::now();
            let window = inner.conf.time_window;
            let entry = restarts.entry(pid).or_default();
            entry.retain(|&t| now.duration_since(t) <= window);

            if inner.conf.max_restarts > 0 && entry.len() >= inner.conf.max_restarts {
                warn!(%pid, restarts = entry.len(), "exceeded max_restarts, not restarting");
                false
            } else {
                entry.push(now);
                true
            }
        };

        if !should_restart {
            return;
        }

        // Look the child up (and start it) without holding the restarts
        // lock, and without holding the children lock while starting —
        // starting can itself take the child's own locks.
        let child = inner.children.read().get(&pid).cloned();
        if let Some(child) = child {
            child.start();
        }
    }
}
