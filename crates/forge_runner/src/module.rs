use async_trait::async_trait;

/// A process-wide long-running unit: initialized once, then driven by its
/// own task until the runner sends on its `done` channel.
#[async_trait]
pub trait Module: Send + Sync {
    /// Runs once, in registration order, on the runner's own task.
    async fn init(&self) {}
    /// Runs for the module's lifetime on a dedicated task. Must return once
    /// `done` yields a value or is closed.
    async fn run(&self, done: flume::Receiver<()>);
    /// Runs once the module's task has exited, in reverse registration
    /// order. A panic here is caught and logged, never propagated.
    async fn destroy(&self) {}
}
