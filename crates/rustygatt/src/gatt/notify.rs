//! Characteristic subscriptions and value-changed fan-out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use log::{debug, info, trace, warn};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::types::{Capabilities, Characteristic, ObjectPath};
use crate::config::StopNotifyPolicy;
use crate::error::{GattError, GattResult};
use crate::uuid::Uuid;

/// Payload delivered to subscribers after a value change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChanged {
    pub path: ObjectPath,
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// Identifies one StartNotify caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
///
/// Dropping it is equivalent to an unsubscribe; the hub prunes closed
/// subscribers on the next publication.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub path: ObjectPath,
    pub receiver: mpsc::Receiver<ValueChanged>,
}

/// Subscription state of one characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<ValueChanged>,
}

/// Tracks subscribers per characteristic and fans out value changes.
///
/// Delivery never blocks: every subscriber has its own bounded queue, and an
/// event that does not fit is dropped for that subscriber only.
#[derive(Debug)]
pub struct NotificationHub {
    queue_depth: usize,
    stop_policy: StopNotifyPolicy,
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<ObjectPath, Vec<Subscriber>>>,
}

impl NotificationHub {
    pub fn new(queue_depth: usize, stop_policy: StopNotifyPolicy) -> Self {
        Self {
            // the initial event of StartNotify must always fit
            queue_depth: queue_depth.max(1),
            stop_policy,
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to `chr` and deliver one value-changed event carrying
    /// `current` before returning.
    ///
    /// Only the new subscriber sees this event. The value is not rewritten, so
    /// neither the write sink nor property-changed observers are involved.
    ///
    /// The caller must hold the characteristic's value read lock so that no
    /// write lands between the snapshot and the registration.
    pub fn start_notify(&self, chr: &Characteristic, current: &[u8]) -> GattResult<Subscription> {
        if !chr.flags.contains(Capabilities::NOTIFY) {
            return Err(GattError::NotSupported(format!(
                "{} does not support notifications",
                chr.path
            )));
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.queue_depth);

        let initial = ValueChanged {
            path: chr.path.clone(),
            uuid: chr.uuid,
            value: current.to_vec(),
        };
        if let Err(e) = sender.try_send(initial) {
            // a fresh channel with capacity >= 1 cannot be full or closed
            warn!("Initial notification for {} not queued: {}", chr.path, e);
        }

        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let list = subscribers.entry(chr.path.clone()).or_default();
        list.retain(|s| !s.sender.is_closed());
        list.push(Subscriber { id, sender });

        info!(
            "Notifications started on {} ({:?}, {} subscriber(s))",
            chr.path,
            id,
            list.len()
        );
        Ok(Subscription {
            id,
            path: chr.path.clone(),
            receiver,
        })
    }

    /// End the subscription `id` on `chr`.
    pub fn stop_notify(&self, chr: &Characteristic, id: SubscriptionId) -> GattResult<()> {
        if self.stop_policy == StopNotifyPolicy::Reject {
            info!("Notification stop refused on {}", chr.path);
            return Err(GattError::NotSupported("Not Supported".into()));
        }
        if !chr.flags.contains(Capabilities::NOTIFY) {
            return Err(GattError::NotSupported(format!(
                "{} does not support notifications",
                chr.path
            )));
        }

        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subscribers.get_mut(&chr.path) else {
            debug!("Notification stop on unsubscribed {} ignored", chr.path);
            return Ok(());
        };

        list.retain(|s| s.id != id);
        let remaining = list.len();
        if remaining == 0 {
            subscribers.remove(&chr.path);
        }

        info!(
            "Notifications stopped on {} ({:?}, {} subscriber(s) left)",
            chr.path, id, remaining
        );
        Ok(())
    }

    /// Deliver a value change on `path` to every subscriber.
    ///
    /// Returns the number of subscribers the event was queued for. Without
    /// subscribers this is a silent no-op.
    pub fn publish_change(&self, path: &ObjectPath, uuid: Uuid, value: &[u8]) -> usize {
        let mut delivered = 0;
        let mut closed = false;
        {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(list) = subscribers.get(path) else {
                trace!("No subscribers on {}", path);
                return 0;
            };

            for subscriber in list {
                let event = ValueChanged {
                    path: path.clone(),
                    uuid,
                    value: value.to_vec(),
                };
                match subscriber.sender.try_send(event) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            "Subscriber {:?} on {} is not keeping up, event dropped",
                            subscriber.id, path
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed = true,
                }
            }
        }

        if closed {
            self.prune(path);
        }

        debug!("Published change on {} to {} subscriber(s)", path, delivered);
        delivered
    }

    fn prune(&self, path: &ObjectPath) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = subscribers.get_mut(path) {
            list.retain(|s| {
                let open = !s.sender.is_closed();
                if !open {
                    debug!("Dropping closed subscriber {:?} on {}", s.id, path);
                }
                open
            });
            if list.is_empty() {
                subscribers.remove(path);
            }
        }
    }

    /// Drop every subscription on `path`. Receivers observe a closed channel.
    pub fn forget(&self, path: &ObjectPath) {
        if self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
        {
            debug!("Subscriptions on {} released", path);
        }
    }

    pub fn subscriber_count(&self, path: &ObjectPath) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map_or(0, |list| list.iter().filter(|s| !s.sender.is_closed()).count())
    }

    /// Subscriber slots held for `path`, closed ones included
    #[cfg(test)]
    pub(crate) fn slots(&self, path: &ObjectPath) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map_or(0, Vec::len)
    }

    pub fn state(&self, path: &ObjectPath) -> NotifyState {
        if self.subscriber_count(path) > 0 {
            NotifyState::Subscribed
        } else {
            NotifyState::Unsubscribed
        }
    }
}
