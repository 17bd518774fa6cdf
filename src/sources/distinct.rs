//! An observable holding a current value.

use crate::core::{IntoObserver, Observable, ObserveHook, Observer};
use crate::error::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

struct CurrentValue<T> {
    value: Arc<Mutex<T>>,
}

impl<T: Clone + Send + 'static> ObserveHook<T> for CurrentValue<T> {
    fn on_observe(&self, observable: &Observable<T>, observer: &Observer<T>) -> Result<()> {
        let current = self.value.lock().clone();
        observable.deliver_exclusive(observer, std::slice::from_ref(&current));
        Ok(())
    }
}

/// Holds a value and broadcasts it whenever it changes.
///
/// A newly linked observer receives the current value first. Setting an
/// equal value emits nothing.
///
/// ```
/// use herald::sources::DistinctValueObservable;
/// use std::sync::{Arc, Mutex};
///
/// let status = DistinctValueObservable::new("idle");
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// status.pipe_to(move |s: &&'static str| sink.lock().unwrap().push(*s))?.activate()?;
///
/// status.set("busy");
/// status.set("busy");
/// assert_eq!(*seen.lock().unwrap(), vec!["idle", "busy"]);
/// # Ok::<(), herald::HeraldError>(())
/// ```
pub struct DistinctValueObservable<T> {
    observable: Observable<T>,
    value: Arc<Mutex<T>>,
}

impl<T> Clone for DistinctValueObservable<T> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> DistinctValueObservable<T> {
    pub fn new(initial: T) -> Self {
        let value = Arc::new(Mutex::new(initial));
        let observable = Observable::with_hook(CurrentValue {
            value: Arc::clone(&value),
        });
        Self { observable, value }
    }

    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    /// Replace the current value, broadcasting it if it differs.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.lock();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        trace!(observable = %self.observable.id(), "value changed");
        self.observable.emit(value);
        true
    }

    pub fn observable(&self) -> &Observable<T> {
        &self.observable
    }

    pub fn pipe_to(&self, observer: impl IntoObserver<T>) -> Result<Observer<T>> {
        self.observable.pipe_to(observer)
    }
}

impl<T> fmt::Debug for DistinctValueObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistinctValueObservable")
            .field("observable", &self.observable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(source: &DistinctValueObservable<i32>) -> (Arc<Mutex<Vec<i32>>>, Observer<i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = source
            .pipe_to(move |v: &i32| sink.lock().push(*v))
            .unwrap();
        observer.activate().unwrap();
        (seen, observer)
    }

    #[test]
    fn test_joining_observer_gets_current_value() {
        let source = DistinctValueObservable::new(1);
        assert!(source.set(2));
        let (seen, _observer) = recorder(&source);
        assert_eq!(*seen.lock(), vec![2]);
        assert_eq!(source.get(), 2);
    }

    #[test]
    fn test_equal_values_are_not_broadcast() {
        let source = DistinctValueObservable::new(0);
        let (seen, _observer) = recorder(&source);
        assert!(!source.set(0));
        assert!(source.set(5));
        assert!(!source.set(5));
        assert_eq!(*seen.lock(), vec![0, 5]);
    }

    #[test]
    fn test_set_during_replay_reaches_everyone() {
        let source = DistinctValueObservable::new(0);
        let (early, _a) = recorder(&source);

        let handle = source.clone();
        let late = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&late);
        source
            .pipe_to(move |v: &i32| {
                sink.lock().push(*v);
                if *v == 0 {
                    handle.set(1);
                }
            })
            .unwrap()
            .activate()
            .unwrap();

        assert_eq!(*early.lock(), vec![0, 1]);
        assert_eq!(*late.lock(), vec![0, 1]);
        assert_eq!(source.get(), 1);
    }
}
