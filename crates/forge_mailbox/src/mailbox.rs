//! [`Mailbox`]: the priority-queue-backed sibling of [`crate::Xchan`], used
//! by actors whose worker wants to service higher-priority messages first
//! when the output side is backed up.

use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};
use forge_collections::{PriorityItem, PriorityQueue};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;

/// The writer-facing handle to a [`Mailbox`].
#[derive(Clone)]
pub struct Mailbox<T> {
    in_tx: Sender<PriorityItem<T>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Mailbox<T> {
    /// Spawns the background task and returns the writer handle plus the
    /// output receiver. `out_size` bounds the output channel; the overflow
    /// priority queue is unbounded.
    pub fn new(out_size: usize) -> (Self, Receiver<T>) {
        let (in_tx, in_rx) = flume::unbounded();
        let (out_tx, out_rx) = flume::bounded(out_size.max(1));
        let cancel = CancellationToken::new();
        let overflow = Arc::new(PriorityQueue::new());

        tokio::spawn(run(in_rx, out_tx, overflow, cancel.clone()));

        (Self { in_tx, cancel }, out_rx)
    }

    /// Writes a value at the given priority (lower dequeues first).
    /// Suspends only if the context is cancelled; the input side is
    /// unbounded from the writer's perspective.
    pub async fn write(&self, value: T, priority: i64) -> Result<(), Error> {
        let item = PriorityItem::new(value, priority);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Closed),
            res = self.in_tx.send_async(item) => res.map_err(|_| Error::Closed),
        }
    }

    /// Stops the background task, closing the output channel once the
    /// in-flight queue has drained (see [`run`]'s shutdown path).
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn run<T: Send + 'static>(
    in_rx: Receiver<PriorityItem<T>>,
    out_tx: Sender<T>,
    overflow: Arc<PriorityQueue<T>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!("mailbox cancelled, dropping buffered items");
                return;
            }
            recv = in_rx.recv_async() => {
                match recv {
                    Ok(item) => {
                        if overflow.is_empty() {
                            if let Err(TrySendError::Full(v)) = out_tx.try_send(item.value) {
                                overflow.push(PriorityItem { value: v, priority: item.priority, timestamp: item.timestamp });
                            }
                        } else {
                            overflow.push(item);
                        }
                        drain_nonblocking(&overflow, &out_tx);
                    }
                    Err(_) => {
                        // Input closed: drain the priority queue, then
                        // whatever's left on the input side (nothing, since
                        // it's closed), then close out.
                        while let Some(value) = overflow.pop() {
                            if out_tx.send_async(value).await.is_err() {
                                return;
                            }
                        }
                        return;
                    }
                }
            }
        }
    }
}

fn drain_nonblocking<T>(overflow: &PriorityQueue<T>, out_tx: &Sender<T>) {
    while let Some(value) = overflow.pop() {
        match out_tx.try_send(value) {
            Ok(()) => {}
            Err(TrySendError::Full(v)) => {
                // Priority information is gone at this point; re-enqueue at
                // the lowest observed priority tier so it isn't lost.
                overflow.push(PriorityItem::new(v, i64::MAX));
                break;
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn higher_priority_drains_first_when_backed_up() {
        let (mailbox, rx) = Mailbox::new(1);
        // Fill the single output slot, then enqueue out-of-order priorities.
        mailbox.write("first", 5).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        mailbox.write("low", 10).await.unwrap();
        mailbox.write("high", 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let a = rx.recv_async().await.unwrap();
        let b = rx.recv_async().await.unwrap();
        let c = rx.recv_async().await.unwrap();
        assert_eq!(vec![a, b, c], vec!["first", "high", "low"]);
    }

    #[tokio::test]
    async fn drains_overflow_then_closes_on_input_drop() {
        let (mailbox, rx) = Mailbox::new(1);
        for i in 0..10 {
            mailbox.write(i, 0).await.unwrap();
        }
        drop(mailbox);

        let mut received = Vec::new();
        while let Ok(v) = rx.recv_async().await {
            received.push(v);
        }
        assert_eq!(received.len(), 10);
    }
}
