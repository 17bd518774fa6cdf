//! Forwarding observer feeding a bounded channel.

use crate::core::{Observable, Observer, WeakObserver};
use crate::error::Result;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{DropReason, SubscriptionConfig, SubscriptionHandle};

struct ChannelSink<T> {
    sender: Sender<T>,
    dropped: Arc<Mutex<Option<DropReason>>>,
    /// The forwarding observer itself, taken when it drops out.
    observer: Mutex<Option<WeakObserver<T>>>,
}

impl<T: Clone + 'static> ChannelSink<T> {
    fn forward(&self, value: &T) {
        let reason = match self.sender.try_send(value.clone()) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => DropReason::BufferOverflow,
            Err(TrySendError::Disconnected(_)) => DropReason::Disconnected,
        };
        self.drop_subscriber(reason);
    }

    fn drop_subscriber(&self, reason: DropReason) {
        let observer = self.observer.lock().take().and_then(|weak| weak.upgrade());
        self.dropped.lock().get_or_insert(reason);
        if let Some(observer) = observer {
            warn!(observer = %observer.id(), ?reason, "dropping channel subscriber");
            observer.disconnect();
        }
    }
}

/// Subscribe to `observable` through a bounded channel.
///
/// The forwarding observer is observing and activated when this returns.
pub fn subscribe_channel<T: Clone + Send + 'static>(
    observable: &Observable<T>,
    config: SubscriptionConfig,
) -> Result<SubscriptionHandle<T>> {
    let (sender, receiver) = bounded(config.buffer_size);
    let dropped = Arc::new(Mutex::new(None));

    let sink = Arc::new(ChannelSink {
        sender,
        dropped: Arc::clone(&dropped),
        observer: Mutex::new(None),
    });
    let forward = Arc::clone(&sink);
    let observer = Observer::new(move |value: &T| forward.forward(value));
    *sink.observer.lock() = Some(observer.downgrade());

    observer.observe(observable)?.activate()?;
    debug!(
        observer = %observer.id(),
        observable = %observable.id(),
        buffer_size = config.buffer_size,
        "channel subscription created"
    );

    Ok(SubscriptionHandle {
        observer,
        receiver,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_subscribe_unsubscribe() {
        let (observable, ctx) = Observable::<u32>::with_context();
        let handle = subscribe_channel(&observable, SubscriptionConfig::default()).unwrap();
        assert!(observable.observed());

        ctx.emit(1);
        assert_eq!(handle.recv_timeout(Duration::from_millis(50)), Ok(1));

        handle.unsubscribe();
        assert!(!observable.observed());
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let (observable, ctx) = Observable::<u32>::with_context();
        let handle =
            subscribe_channel(&observable, SubscriptionConfig::with_buffer_size(2)).unwrap();

        for i in 0..10 {
            ctx.emit(i);
        }

        assert!(!observable.observed());
        assert_eq!(handle.drop_reason(), Some(DropReason::BufferOverflow));
        assert_eq!(handle.drain(), vec![0, 1]);
    }

    #[test]
    fn test_dropped_receiver_disconnects_subscriber() {
        let (observable, ctx) = Observable::<u32>::with_context();
        let handle = subscribe_channel(&observable, SubscriptionConfig::default()).unwrap();
        let observer = handle.observer().clone();
        drop(handle);

        assert!(!observable.observed());
        assert!(observer.observables().is_empty());
        ctx.emit(1);
    }

    #[test]
    fn test_values_cross_threads() {
        let (observable, ctx) = Observable::<u32>::with_context();
        let handle = subscribe_channel(&observable, SubscriptionConfig::default()).unwrap();

        let consumer = thread::spawn(move || {
            let mut total = 0;
            while let Ok(value) = handle.recv_timeout(Duration::from_secs(1)) {
                total += value;
                if value == 100 {
                    break;
                }
            }
            total
        });

        for i in 1..=100 {
            ctx.emit(i);
        }
        assert_eq!(consumer.join().unwrap(), 5050);
    }
}
