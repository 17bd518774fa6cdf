//! Finite-state observable backed by an iterator.

use crate::config::FiniteStateConfig;
use crate::finite_state::{FiniteStateObservable, FsoContext, Producer};
use crate::types::State;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};

/// Create a finite-state observable emitting the items of `items` as `next`
/// notifications, then `complete`.
///
/// Items are pulled synchronously while the observable is observed. When it
/// loses its last observer pulling stops; the next observer resumes from the
/// same position. Pair with a `*-per-observer` [`CacheMode`](crate::CacheMode)
/// so a returning observer sees the items it missed.
///
/// ```
/// use herald::sources::from_iter;
/// use herald::CacheMode;
/// use std::sync::{Arc, Mutex};
///
/// let numbers = from_iter::<_, String>(1..=3, CacheMode::Cache);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// numbers.on_next(move |n| sink.lock().unwrap().push(*n))?;
///
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
/// assert!(numbers.state().is_final());
/// # Ok::<(), herald::HeraldError>(())
/// ```
pub fn from_iter<I, E>(
    items: I,
    config: impl Into<FiniteStateConfig>,
) -> FiniteStateObservable<I::Item, E>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let items = items.into_iter();
    FiniteStateObservable::create(config, move |context| {
        let producer: Box<dyn Producer> = Box::new(IterProducer {
            items: Mutex::new(items),
            running: AtomicBool::new(false),
            context,
        });
        Some(producer)
    })
}

struct IterProducer<I: Iterator, E> {
    items: Mutex<I>,
    running: AtomicBool,
    context: FsoContext<I::Item, E>,
}

impl<I, E> Producer for IterProducer<I, E>
where
    I: Iterator + Send,
    I::Item: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_observed(&self) {
        self.running.store(true, Ordering::SeqCst);
        trace!("iterator source started");

        while self.running.load(Ordering::SeqCst) {
            if !matches!(self.context.state(), Ok(State::Next)) {
                break;
            }
            // the item is taken before emitting so callbacks may re-enter
            let item = self.items.lock().next();
            let emitted = match item {
                Some(item) => self.context.next(item),
                None => {
                    let done = self.context.complete();
                    self.running.store(false, Ordering::SeqCst);
                    done
                }
            };
            if let Err(e) = emitted {
                warn!(error = %e, "iterator source stopped");
                break;
            }
        }
    }

    fn on_unobserved(&self) {
        self.running.store(false, Ordering::SeqCst);
        trace!("iterator source paused");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_state::FsoNotification;
    use crate::types::CacheMode;
    use crate::Observer;
    use std::sync::Arc;

    type Numbers = FsoNotification<u32, String>;

    #[test]
    fn test_emits_all_items_then_completes() {
        let numbers = from_iter::<_, String>(vec![1, 2, 3], CacheMode::Once);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        numbers
            .pipe_to(move |n: &Numbers| sink.lock().push(n.name().to_string()))
            .unwrap()
            .activate()
            .unwrap();

        assert_eq!(*seen.lock(), vec!["next", "next", "next", "complete"]);
        assert_eq!(numbers.state(), State::Complete);
    }

    #[test]
    fn test_pauses_when_unobserved_and_resumes() {
        let numbers = from_iter::<_, String>(1..=5u32, CacheMode::CachePerObserver);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Observer<Numbers>>>> = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        let me = Arc::clone(&slot);
        let observer = Observer::new(move |n: &Numbers| {
            if let Some(v) = n.value().value() {
                sink.lock().push(*v);
                if *v == 2 {
                    let me = me.lock().take();
                    if let Some(me) = me {
                        me.deactivate();
                    }
                }
            }
        });
        *slot.lock() = Some(observer.clone());

        observer.observe(numbers.observable()).unwrap();
        observer.activate().unwrap();
        assert!(!numbers.observed());
        assert_eq!(numbers.state(), State::Next);
        assert_eq!(*seen.lock(), vec![1, 2]);

        observer.activate().unwrap();
        assert_eq!(numbers.state(), State::Complete);
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4, 5]);
    }
}
