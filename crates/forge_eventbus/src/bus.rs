use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use forge_collections::Queue;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

/// Identifies one registered channel or queue handler within an event's
/// handler list, returned by every `subscribe*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ChanEntry<T> {
    id: u64,
    sender: flume::Sender<T>,
}

struct QueueEntry<T> {
    id: u64,
    queue: Arc<Queue<Option<T>>>,
}

struct Inner<T> {
    chan_handlers: RwLock<HashMap<String, Vec<ChanEntry<T>>>>,
    queue_handlers: RwLock<HashMap<String, Vec<QueueEntry<T>>>>,
    capacity: usize,
    next_id: AtomicU64,
}

/// A typed event bus keyed by topic name. `T` is the payload carried by
/// every event on this bus; use one `EventBus<T>` per distinct payload type.
pub struct EventBus<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> EventBus<T>
where
    T: Send + 'static,
{
    /// Creates a bus whose channel-mode subscriptions are bounded to
    /// `capacity` buffered messages (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                chan_handlers: RwLock::new(HashMap::new()),
                queue_handlers: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a raw bounded channel for `event` and returns its id
    /// (for [`EventBus::unsubscribe_channel`]) plus the receiving half.
    pub fn subscribe_channel(&self, event: &str) -> (SubscriptionId, flume::Receiver<T>) {
        let (tx, rx) = flume::bounded(self.inner.capacity);
        let id = self.next_id();
        self.inner
            .chan_handlers
            .write()
            .entry(event.to_string())
            .or_default()
            .push(ChanEntry { id, sender: tx });
        (SubscriptionId(id), rx)
    }

    /// Subscribes `cb` to every message published to `event`. Returns a
    /// [`Cancel`] that, once `.cancel().await`ed, is guaranteed to have
    /// observed the consumer task exit before any further `cb` invocation.
    pub fn subscribe(
        &self,
        event: &str,
        cb: impl Fn(T) + Send + Sync + 'static,
    ) -> Cancel<T> {
        let (id, rx) = self.subscribe_channel(event);
        let event = event.to_string();
        let handle = tokio::spawn(async move {
            while let Ok(msg) = rx.recv_async().await {
                cb(msg);
            }
        });
        Cancel::chan(self.inner.clone(), event, id.0, handle)
    }

    /// Like [`EventBus::subscribe`], but `cb` fires at most once and the
    /// subscription then removes itself.
    pub fn subscribe_once(
        &self,
        event: &str,
        cb: impl FnOnce(T) + Send + 'static,
    ) -> Cancel<T> {
        let (id, rx) = self.subscribe_channel(event);
        let event = event.to_string();
        let inner = self.inner.clone();
        let event_for_task = event.clone();
        let handle = tokio::spawn(async move {
            if let Ok(msg) = rx.recv_async().await {
                cb(msg);
            }
            remove_chan(&inner, &event_for_task, id.0);
        });
        Cancel::chan(self.inner.clone(), event, id.0, handle)
    }

    /// Like [`EventBus::subscribe`], but `cb` only fires for messages that
    /// satisfy `pred`; messages that don't pass are dropped silently and the
    /// subscription stays active.
    pub fn subscribe_filter(
        &self,
        event: &str,
        pred: impl Fn(&T) -> bool + Send + Sync + 'static,
        cb: impl Fn(T) + Send + Sync + 'static,
    ) -> Cancel<T> {
        let (id, rx) = self.subscribe_channel(event);
        let event = event.to_string();
        let handle = tokio::spawn(async move {
            while let Ok(msg) = rx.recv_async().await {
                if pred(&msg) {
                    cb(msg);
                }
            }
        });
        Cancel::chan(self.inner.clone(), event, id.0, handle)
    }

    /// Subscribes `cb` to a durable, queue-backed delivery of `event`:
    /// published messages are buffered (unbounded) until consumed, rather
    /// than dropped when the consumer is briefly behind.
    pub fn queue_subscribe(
        &self,
        event: &str,
        cb: impl Fn(T) + Send + Sync + 'static,
    ) -> Cancel<T> {
        let queue = Arc::new(Queue::new());
        let id = self.next_id();
        self.inner
            .queue_handlers
            .write()
            .entry(event.to_string())
            .or_default()
            .push(QueueEntry { id, queue: queue.clone() });

        let consumer_queue = queue.clone();
        let handle = tokio::task::spawn_blocking(move || loop {
            match consumer_queue.wait_pop() {
                Some(msg) => cb(msg),
                None => break,
            }
        });

        Cancel::queue(self.inner.clone(), event.to_string(), id, handle, queue)
    }

    /// Non-blocking best-effort publish: every channel-mode subscriber gets
    /// `try_send`. A subscriber that is full or disconnected is dropped with
    /// a logged warning rather than blocking or erroring the publisher.
    pub fn publish(&self, event: &str, data: T)
    where
        T: Clone,
    {
        let handlers = self.inner.chan_handlers.read();
        let Some(entries) = handlers.get(event) else {
            return;
        };
        for entry in entries {
            if entry.sender.try_send(data.clone()).is_err() {
                warn!(event, "dropped event: channel subscriber full or closed");
            }
        }
    }

    /// Pushes `data` onto every queue-mode subscriber of `event`. Queues are
    /// unbounded, so this only fails to deliver if there are no subscribers.
    pub fn publish_queue(&self, event: &str, data: T)
    where
        T: Clone,
    {
        let handlers = self.inner.queue_handlers.read();
        let Some(entries) = handlers.get(event) else {
            return;
        };
        for entry in entries {
            entry.queue.push(Some(data.clone()));
        }
    }

    /// Closes every channel subscription and clears-then-closes every queue
    /// subscription registered for `event`. Does not wait for their consumer
    /// tasks to exit; use the [`Cancel`] returned by `subscribe*` when that
    /// guarantee is required for a specific subscription.
    pub fn unsubscribe(&self, event: &str) {
        self.inner.chan_handlers.write().remove(event);
        if let Some(entries) = self.inner.queue_handlers.write().remove(event) {
            for entry in entries {
                entry.queue.clear();
                entry.queue.push(None);
            }
        }
    }

    /// Removes a single channel-mode subscription by id, closing its
    /// channel.
    pub fn unsubscribe_channel(&self, event: &str, id: SubscriptionId) {
        remove_chan(&self.inner, event, id.0);
    }

    /// Removes a single queue-mode subscription by id, clearing and closing
    /// its queue.
    pub fn unsubscribe_queue(&self, event: &str, id: SubscriptionId) {
        remove_queue(&self.inner, event, id.0);
    }
}

fn remove_chan<T>(inner: &Arc<Inner<T>>, event: &str, id: u64) {
    let mut handlers = inner.chan_handlers.write();
    if let Some(entries) = handlers.get_mut(event) {
        entries.retain(|e| e.id != id);
        if entries.is_empty() {
            handlers.remove(event);
        }
    }
}

fn remove_queue<T>(inner: &Arc<Inner<T>>, event: &str, id: u64) -> Option<Arc<Queue<Option<T>>>> {
    let mut handlers = inner.queue_handlers.write();
    let entries = handlers.get_mut(event)?;
    let idx = entries.iter().position(|e| e.id == id)?;
    let removed = entries.remove(idx);
    if entries.is_empty() {
        handlers.remove(event);
    }
    Some(removed.queue)
}

enum Kind<T> {
    Chan,
    Queue(Arc<Queue<Option<T>>>),
}

/// Returned by every `subscribe*` call. Dropping it leaves the subscription
/// running; call [`Cancel::cancel`] to unregister and wait for the consumer
/// task to exit.
pub struct Cancel<T> {
    inner: Arc<Inner<T>>,
    event: String,
    id: u64,
    handle: JoinHandle<()>,
    kind: Kind<T>,
}

impl<T> Cancel<T> {
    fn chan(inner: Arc<Inner<T>>, event: String, id: u64, handle: JoinHandle<()>) -> Self {
        Self { inner, event, id, handle, kind: Kind::Chan }
    }

    fn queue(
        inner: Arc<Inner<T>>,
        event: String,
        id: u64,
        handle: JoinHandle<()>,
        queue: Arc<Queue<Option<T>>>,
    ) -> Self {
        Self { inner, event, id, handle, kind: Kind::Queue(queue) }
    }

    /// This subscription's id.
    pub fn id(&self) -> SubscriptionId {
        SubscriptionId(self.id)
    }

    /// Unregisters the subscription and waits for its consumer task to
    /// exit. After this returns, `cb` is guaranteed not to run again.
    pub async fn cancel(self) {
        match &self.kind {
            Kind::Chan => {
                remove_chan(&self.inner, &self.event, self.id);
            }
            Kind::Queue(queue) => {
                remove_queue(&self.inner, &self.event, self.id);
                queue.push(None);
            }
        }
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_reaches_channel_subscriber() {
        let bus: EventBus<u32> = EventBus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let cancel = bus.subscribe("score", move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish("score", 10);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        cancel.cancel().await;
    }

    #[tokio::test]
    async fn publish_to_full_channel_is_dropped_not_blocking() {
        let bus: EventBus<u32> = EventBus::new(1);
        let (_id, _rx) = bus.subscribe_channel("spam");
        // capacity 1, no receiver draining: first send fills it, rest drop.
        bus.publish("spam", 1);
        bus.publish("spam", 2);
        bus.publish("spam", 3);
    }

    #[tokio::test]
    async fn subscribe_once_fires_exactly_once() {
        let bus: EventBus<u32> = EventBus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let _cancel = bus.subscribe_once("join", move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish("join", 1);
        bus.publish("join", 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribe_filter_skips_nonmatching() {
        let bus: EventBus<u32> = EventBus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let cancel = bus.subscribe_filter("hp", |n| *n > 5, move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish("hp", 1);
        bus.publish("hp", 9);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        cancel.cancel().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queue_subscribe_is_durable_across_bursts() {
        let bus: EventBus<u32> = EventBus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let cancel = bus.queue_subscribe("loot", move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
        });
        for i in 0..20 {
            bus.publish_queue("loot", i);
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 20);
        cancel.cancel().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_joins_an_in_flight_callback_before_returning() {
        let bus: EventBus<u32> = EventBus::new(8);
        let running = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let running2 = running.clone();
        let finished2 = finished.clone();
        let cancel = bus.subscribe("slow", move |_| {
            running2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            finished2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish("slow", 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(running.load(Ordering::SeqCst), 1);
        cancel.cancel().await;
        assert_eq!(
            finished.load(Ordering::SeqCst),
            1,
            "cancel() must not return before the in-flight callback completes"
        );
    }

    #[tokio::test]
    async fn unsubscribe_closes_all_channel_subscribers_for_event() {
        let bus: EventBus<u32> = EventBus::new(8);
        let (_id, rx) = bus.subscribe_channel("gone");
        bus.unsubscribe("gone");
        assert!(rx.recv_async().await.is_err());
    }
}
