//! `Xchan[T]`: a bounded producer-to-consumer channel backed by a growable
//! ring buffer, so an unbounded-looking writer never blocks on a bounded
//! reader except when the ring itself would need to grow past what the
//! caller is willing to wait for.

use flume::{Receiver, Sender, TrySendError};
use forge_collections::RingBuffer;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;

/// The writer-facing handle to an [`Xchan`]. Cheap to clone; every clone
/// shares the same input channel, so FIFO order only holds per single
/// producer.
#[derive(Clone)]
pub struct Xchan<T> {
    in_tx: Sender<T>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Xchan<T> {
    /// Spawns the background forwarding task and returns the writer handle
    /// plus the output receiver.
    ///
    /// - `buf_size`: initial capacity of the ring overflow buffer.
    /// - `in_size`: capacity of the input channel.
    /// - `out_size`: capacity of the output channel.
    pub fn new(buf_size: usize, in_size: usize, out_size: usize) -> (Self, Receiver<T>) {
        let (in_tx, in_rx) = flume::bounded(in_size.max(1));
        let (out_tx, out_rx) = flume::bounded(out_size.max(1));
        let cancel = CancellationToken::new();

        tokio::spawn(run(in_rx, out_tx, RingBuffer::new(buf_size.max(1)), cancel.clone()));

        (Self { in_tx, cancel }, out_rx)
    }

    /// Writes a value. Suspends until the input channel has room, the
    /// context is cancelled, or the channel is closed.
    pub async fn write(&self, value: T) -> Result<(), Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Closed),
            res = self.in_tx.send_async(value) => res.map_err(|_| Error::Closed),
        }
    }

    /// Stops the background task: any buffered items are dropped (not
    /// drained) and the output channel is closed immediately.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn run<T: Send + 'static>(
    in_rx: Receiver<T>,
    out_tx: Sender<T>,
    mut ring: RingBuffer<T>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!("xchan cancelled, dropping buffered items");
                return;
            }
            recv = in_rx.recv_async() => {
                match recv {
                    Ok(value) => {
                        if ring.is_empty() {
                            if let Err(TrySendError::Full(v)) = out_tx.try_send(value) {
                                ring.push(v);
                            }
                        } else {
                            ring.push(value);
                        }
                        drain_nonblocking(&mut ring, &out_tx);
                    }
                    Err(_) => {
                        // Input closed: drain everything before closing out.
                        while let Some(item) = ring.pop() {
                            if out_tx.send_async(item).await.is_err() {
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

/// Drains as much of the ring into `out` as fits without blocking, resetting
/// the ring to its initial capacity once a burst has fully drained.
fn drain_nonblocking<T>(ring: &mut RingBuffer<T>, out_tx: &Sender<T>) {
    while !ring.is_empty() {
        let item = ring.pop().expect("checked non-empty");
        match out_tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(v)) => {
                ring.push(v);
                break;
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    if ring.is_empty() {
        ring.reset();
    }
}
