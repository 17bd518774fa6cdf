//! Subscription types for channel-backed observers.

use crate::core::Observer;
use crate::types::ObserverId;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered values before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

impl SubscriptionConfig {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// The receiving side went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Handle to a channel subscription.
///
/// Dropping the handle disconnects the subscriber from everything it
/// observes.
pub struct SubscriptionHandle<T: 'static> {
    pub(super) observer: Observer<T>,
    pub(super) receiver: Receiver<T>,
    pub(super) dropped: Arc<Mutex<Option<DropReason>>>,
}

impl<T: 'static> SubscriptionHandle<T> {
    pub fn id(&self) -> ObserverId {
        self.observer.id()
    }

    /// The forwarding observer.
    pub fn observer(&self) -> &Observer<T> {
        &self.observer
    }

    /// Receive the next value (blocking).
    pub fn recv(&self) -> Result<T, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a value (non-blocking).
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every value buffered so far.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Set once the subscriber has been disconnected.
    pub fn drop_reason(&self) -> Option<DropReason> {
        *self.dropped.lock()
    }

    pub fn is_dropped(&self) -> bool {
        self.drop_reason().is_some()
    }

    pub fn unsubscribe(self) {
        self.dropped.lock().get_or_insert(DropReason::Unsubscribed);
    }
}

impl<T: 'static> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
