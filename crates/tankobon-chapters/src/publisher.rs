//! Replay-caching broadcast.
//!
//! A [`Publisher`] keeps the last published value and a list of listeners.
//! Listeners are notified in registration order; each one drains its own
//! [`Subscription`] on whatever task or thread it likes, which is how values
//! reach the UI's designated queue.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

/// What a new subscriber receives before live updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// The most recent value, to every subscriber.
    Latest,
    /// A value published while nobody listened, to the next subscriber
    /// only. Values that reached a listener are never replayed.
    UntilDelivered,
}

struct Inner<T> {
    cached: Option<Arc<T>>,
    listeners: Vec<mpsc::UnboundedSender<Arc<T>>>,
}

/// Broadcast point with a cached value.
pub struct Publisher<T> {
    policy: ReplayPolicy,
    inner: Mutex<Inner<T>>,
}

impl<T> Publisher<T> {
    pub fn new(policy: ReplayPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                cached: None,
                listeners: Vec::new(),
            }),
        }
    }

    /// Publisher replaying its latest value.
    pub fn latest() -> Self {
        Self::new(ReplayPolicy::Latest)
    }

    /// Publisher holding undelivered values for the next subscriber.
    pub fn until_delivered() -> Self {
        Self::new(ReplayPolicy::UntilDelivered)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener. The cached value, if any, is queued first.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let replay = match self.policy {
            ReplayPolicy::Latest => inner.cached.clone(),
            ReplayPolicy::UntilDelivered => inner.cached.take(),
        };
        if let Some(value) = replay {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(value);
        }
        inner.listeners.push(tx);
        Subscription { rx }
    }

    /// Publish a value. Returns how many listeners received it.
    pub fn publish(&self, value: T) -> usize {
        self.publish_shared(Arc::new(value))
    }

    /// Publish a value that is already shared.
    pub fn publish_shared(&self, value: Arc<T>) -> usize {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|listener| listener.send(Arc::clone(&value)).is_ok());
        let delivered = inner.listeners.len();
        inner.cached = match self.policy {
            ReplayPolicy::Latest => Some(value),
            ReplayPolicy::UntilDelivered if delivered == 0 => Some(value),
            ReplayPolicy::UntilDelivered => None,
        };
        delivered
    }

    /// The cached value.
    pub fn current(&self) -> Option<Arc<T>> {
        self.lock().cached.clone()
    }

    /// Number of listeners whose subscription is still alive.
    pub fn listener_count(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|listener| !listener.is_closed());
        inner.listeners.len()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::latest()
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Publisher")
            .field("policy", &self.policy)
            .field("has_cached", &inner.cached.is_some())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// Receiving end of a [`Publisher`]. Dropping it detaches the listener.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Arc<T>>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.rx.recv().await
    }

    /// Next queued value without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        self.rx.try_recv().ok()
    }

    /// Drain the queue and keep only the newest value.
    pub fn latest(&mut self) -> Option<Arc<T>> {
        let mut newest = None;
        while let Ok(value) = self.rx.try_recv() {
            newest = Some(value);
        }
        newest
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
