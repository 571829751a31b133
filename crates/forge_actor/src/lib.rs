//! Supervised, panic-tolerant long-running workers: a typed [`Worker`]
//! trait, the [`Actor`] that runs one under a [`Pid`], and a [`Supervisor`]
//! that restarts panicked children under a rate-limited policy.

mod actor;
mod pid;
mod supervisor;
mod worker;

pub use actor::{Actor, Restartable};
pub use pid::Pid;
pub use supervisor::{Supervisor, SupervisorConf, SupervisorHandle};
pub use worker::{ActorContext, Worker, WorkerState};
