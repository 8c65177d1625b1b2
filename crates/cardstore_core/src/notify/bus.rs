//! Change notification contract and in-process bus.
//!
//! # Invariants
//! - A subscription on key `k` observes publications of `k` and of every
//!   descendant key `k/...`.
//! - Publishing never blocks on subscribers and never fails; publishing with
//!   no live subscription is a no-op.
//! - Dropped subscriptions are pruned on the next publication or
//!   subscription, so registrations stay bounded by the live ones.

use log::{debug, trace};
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Opaque resource identifier used to group change events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationKey(String);

impl NotificationKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a subscriber on `self` should observe `published`.
    pub fn covers(&self, published: &NotificationKey) -> bool {
        published.0 == self.0
            || published
                .0
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Display for NotificationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&crate::model::address::ResourceAddress> for NotificationKey {
    fn from(value: &crate::model::address::ResourceAddress) -> Self {
        Self(value.to_string())
    }
}

/// Publish/subscribe contract used by the record store after mutations.
pub trait NotificationBus: Send + Sync {
    /// Delivers `key` to every subscription covering it.
    fn publish(&self, key: &NotificationKey);
    /// Registers interest in `key` and its descendants.
    fn subscribe(&self, key: &NotificationKey) -> Subscription;
}

/// Receiving end of one registration.
///
/// Dropping the subscription unregisters it.
#[derive(Debug)]
pub struct Subscription {
    key: NotificationKey,
    receiver: Receiver<NotificationKey>,
    /// Liveness token; the bus prunes senders whose token is gone.
    _alive: Arc<()>,
}

impl Subscription {
    /// Creates a linked sender/subscription pair for bus implementations.
    pub fn channel(key: NotificationKey) -> (SubscriptionSender, Self) {
        let (sender, receiver) = mpsc::channel();
        let alive = Arc::new(());
        let sender = SubscriptionSender {
            sender,
            alive: Arc::downgrade(&alive),
        };
        (
            sender,
            Self {
                key,
                receiver,
                _alive: alive,
            },
        )
    }

    pub fn key(&self) -> &NotificationKey {
        &self.key
    }

    /// Next pending change, without waiting.
    pub fn try_next(&self) -> Option<NotificationKey> {
        self.receiver.try_recv().ok()
    }

    /// Next change, waiting up to `timeout`.
    pub fn wait(&self, timeout: Duration) -> Option<NotificationKey> {
        match self.receiver.recv_timeout(timeout) {
            Ok(key) => Some(key),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// All pending changes in publication order.
    pub fn drain(&self) -> Vec<NotificationKey> {
        self.receiver.try_iter().collect()
    }
}

/// Delivering end of one registration, held by the bus.
#[derive(Debug, Clone)]
pub struct SubscriptionSender {
    sender: Sender<NotificationKey>,
    alive: Weak<()>,
}

impl SubscriptionSender {
    /// Delivers `key`; `false` once the subscription has been dropped.
    pub fn send(&self, key: NotificationKey) -> bool {
        !self.is_closed() && self.sender.send(key).is_ok()
    }

    /// Whether the subscription side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.alive.strong_count() == 0
    }
}

struct Subscriber {
    key: NotificationKey,
    sender: SubscriptionSender,
}

/// In-process bus delivering synchronously on the publisher's thread.
#[derive(Default)]
pub struct LocalNotificationBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl LocalNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registrations that have not been pruned yet.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

impl NotificationBus for LocalNotificationBus {
    fn publish(&self, key: &NotificationKey) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            debug!("event=notify_publish module=notify status=skipped reason=poisoned key={key}");
            return;
        };

        let mut delivered = 0usize;
        subscribers.retain(|subscriber| {
            if !subscriber.key.covers(key) {
                return true;
            }
            let sent = subscriber.sender.send(key.clone());
            delivered += usize::from(sent);
            sent
        });
        trace!("event=notify_publish module=notify status=ok key={key} delivered={delivered}");
    }

    fn subscribe(&self, key: &NotificationKey) -> Subscription {
        let (sender, subscription) = Subscription::channel(key.clone());
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.retain(|subscriber| !subscriber.sender.is_closed());
                subscribers.push(Subscriber {
                    key: key.clone(),
                    sender,
                });
            }
            Err(_) => {
                debug!("event=notify_subscribe module=notify status=skipped reason=poisoned key={key}")
            }
        }
        subscription
    }
}
