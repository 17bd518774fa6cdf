//! Typed push sinks.

use super::observable::{Observable, WeakObservable};
use crate::error::Result;
use crate::types::ObserverId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

type EmitFn<T> = dyn Fn(&T, Option<&Observable<T>>) + Send + Sync;

struct ObserverState<T> {
    activated: bool,
    /// Recorded observables, in observe order. Held weakly; an observable
    /// keeps its linked observers alive, not the other way round.
    observables: Vec<WeakObservable<T>>,
}

impl<T> ObserverState<T> {
    /// Live recorded observables, dropping records of released ones.
    fn live(&mut self) -> Vec<Observable<T>> {
        self.observables.retain(WeakObservable::is_alive);
        self.observables
            .iter()
            .filter_map(WeakObservable::upgrade)
            .collect()
    }

    fn position(&self, observable: &Observable<T>) -> Option<usize> {
        self.observables.iter().position(|o| o.is(observable))
    }
}

struct ObserverInner<T> {
    id: ObserverId,
    on_emit: Box<EmitFn<T>>,
    state: Mutex<ObserverState<T>>,
}

/// A typed push sink bound to a delivery callback.
///
/// Observing records an observable; only an activated observer is linked to
/// the observables it records and receives their broadcasts.
pub struct Observer<T> {
    inner: Arc<ObserverInner<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Observer<T> {
    /// Create an inactive observer from a value callback.
    pub fn new<F>(on_emit: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::with_source(move |value, _| on_emit(value))
    }

    /// Create an inactive observer whose callback also receives the source.
    ///
    /// The source is `None` when the value was pushed with [`Observer::emit`].
    pub fn with_source<F>(on_emit: F) -> Self
    where
        F: Fn(&T, Option<&Observable<T>>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ObserverInner {
                id: ObserverId::next(),
                on_emit: Box::new(on_emit),
                state: Mutex::new(ObserverState {
                    activated: false,
                    observables: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    pub fn activated(&self) -> bool {
        self.inner.state.lock().activated
    }

    /// Recorded observables, in observe order.
    pub fn observables(&self) -> Vec<Observable<T>> {
        self.inner.state.lock().live()
    }

    /// Whether `observable` is recorded by this observer.
    pub fn observing(&self, observable: &Observable<T>) -> bool {
        self.inner.state.lock().position(observable).is_some()
    }

    /// Link to every recorded observable.
    ///
    /// Stops at the first observable whose hook rejects the link; that
    /// observable is forgotten and the error returned.
    pub fn activate(&self) -> Result<&Self> {
        let targets = {
            let mut state = self.inner.state.lock();
            if state.activated {
                return Ok(self);
            }
            state.activated = true;
            state.live()
        };
        trace!(observer = %self.id(), observables = targets.len(), "observer activated");

        for observable in &targets {
            if !self.wants_link(observable) {
                continue;
            }
            if let Err(e) = observable.link(self) {
                self.forget(observable);
                return Err(e);
            }
        }
        Ok(self)
    }

    /// Unlink from every recorded observable.
    pub fn deactivate(&self) -> &Self {
        let targets = {
            let mut state = self.inner.state.lock();
            if !state.activated {
                return self;
            }
            state.activated = false;
            state.live()
        };
        trace!(observer = %self.id(), observables = targets.len(), "observer deactivated");

        for observable in &targets {
            // a hook may have re-activated us while we were unlinking
            if self.activated() {
                break;
            }
            observable.unlink(self);
        }
        self
    }

    /// Flip the activation state.
    pub fn toggle(&self) -> Result<&Self> {
        if self.activated() {
            Ok(self.deactivate())
        } else {
            self.activate()
        }
    }

    /// Record `observable`, linking immediately when activated.
    ///
    /// Observing an already recorded observable does nothing.
    pub fn observe(&self, observable: &Observable<T>) -> Result<&Self> {
        let link = {
            let mut state = self.inner.state.lock();
            state.observables.retain(WeakObservable::is_alive);
            if state.position(observable).is_some() {
                return Ok(self);
            }
            state.observables.push(observable.downgrade());
            state.activated
        };

        if link {
            if let Err(e) = observable.link(self) {
                self.forget(observable);
                return Err(e);
            }
        }
        Ok(self)
    }

    pub fn observe_all<'a, I>(&self, observables: I) -> Result<&Self>
    where
        I: IntoIterator<Item = &'a Observable<T>>,
    {
        for observable in observables {
            self.observe(observable)?;
        }
        Ok(self)
    }

    /// Forget `observable`, unlinking when activated.
    pub fn unobserve(&self, observable: &Observable<T>) -> &Self {
        let unlink = {
            let mut state = self.inner.state.lock();
            match state.position(observable) {
                Some(pos) => {
                    state.observables.remove(pos);
                    state.activated
                }
                None => return self,
            }
        };

        if unlink {
            observable.unlink(self);
        }
        self
    }

    pub fn unobserve_all<'a, I>(&self, observables: I) -> &Self
    where
        I: IntoIterator<Item = &'a Observable<T>>,
    {
        for observable in observables {
            self.unobserve(observable);
        }
        self
    }

    /// Unobserve everything.
    pub fn disconnect(&self) -> &Self {
        let (targets, activated) = {
            let mut state = self.inner.state.lock();
            let targets = state.live();
            state.observables.clear();
            (targets, state.activated)
        };

        if activated {
            for observable in &targets {
                observable.unlink(self);
            }
        }
        self
    }

    /// Push a value straight into the callback, bypassing any observable.
    pub fn emit(&self, value: &T) {
        self.deliver(value, None);
    }

    pub fn ptr_eq(&self, other: &Observer<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn deliver(&self, value: &T, source: Option<&Observable<T>>) {
        (self.inner.on_emit)(value, source);
    }

    pub(crate) fn downgrade(&self) -> WeakObserver<T> {
        WeakObserver {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn wants_link(&self, observable: &Observable<T>) -> bool {
        let state = self.inner.state.lock();
        state.activated && state.position(observable).is_some()
    }

    fn forget(&self, observable: &Observable<T>) {
        self.inner
            .state
            .lock()
            .observables
            .retain(|o| o.is_alive() && !o.is(observable));
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Observer")
            .field("id", &self.inner.id)
            .field("activated", &state.activated)
            .field("observables", &state.observables.len())
            .finish()
    }
}

/// Non-owning observer handle that remembers the observer's id after it
/// is released.
pub(crate) struct WeakObserver<T> {
    id: ObserverId,
    inner: Weak<ObserverInner<T>>,
}

impl<T> WeakObserver<T> {
    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Option<Observer<T>> {
        self.inner.upgrade().map(|inner| Observer { inner })
    }
}

/// Conversion into an [`Observer`], so APIs accept observers or callbacks.
pub trait IntoObserver<T> {
    fn into_observer(self) -> Observer<T>;
}

impl<T> IntoObserver<T> for Observer<T> {
    fn into_observer(self) -> Observer<T> {
        self
    }
}

impl<T: 'static, F> IntoObserver<T> for F
where
    F: Fn(&T) + Send + Sync + 'static,
{
    fn into_observer(self) -> Observer<T> {
        Observer::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_observe_before_activation_records_without_linking() {
        let observable = Observable::<u8>::new();
        let observer = Observer::new(|_: &u8| {});

        observer.observe(&observable).unwrap();
        assert!(observer.observing(&observable));
        assert!(!observable.observed());

        observer.activate().unwrap();
        assert!(observable.observed());
        assert!(observable.observers()[0].ptr_eq(&observer));
    }

    #[test]
    fn test_duplicate_observe_does_not_double_link() {
        let observable = Observable::<u8>::new();
        let observer = Observer::new(|_: &u8| {});
        observer.activate().unwrap();

        observer.observe(&observable).unwrap();
        observer.observe(&observable).unwrap();

        assert_eq!(observable.observer_count(), 1);
        assert_eq!(observer.observables().len(), 1);
    }

    #[test]
    fn test_unobserve_and_disconnect() {
        let a = Observable::<u8>::new();
        let b = Observable::<u8>::new();
        let observer = Observer::new(|_: &u8| {});
        observer.observe_all([&a, &b]).unwrap().activate().unwrap();

        observer.unobserve(&a);
        assert!(!a.observed());
        assert!(b.observed());
        assert!(!observer.observing(&a));

        observer.disconnect();
        assert!(!b.observed());
        assert!(observer.observables().is_empty());
        assert!(observer.activated());
    }

    #[test]
    fn test_toggle() {
        let observable = Observable::<u8>::new();
        let observer = Observer::new(|_: &u8| {});
        observer.observe(&observable).unwrap();

        observer.toggle().unwrap();
        assert!(observer.activated());
        assert!(observable.observed());

        observer.toggle().unwrap();
        assert!(!observer.activated());
        assert!(!observable.observed());
    }

    #[test]
    fn test_emit_bypasses_observables() {
        let sources = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sources);
        let observer = Observer::with_source(move |v: &u8, src: Option<&Observable<u8>>| {
            sink.lock().push((*v, src.map(|o| o.id())));
        });

        observer.emit(&3);

        let (observable, ctx) = Observable::<u8>::with_context();
        observer.observe(&observable).unwrap().activate().unwrap();
        ctx.emit(4);

        assert_eq!(*sources.lock(), vec![(3, None), (4, Some(observable.id()))]);
    }

    #[test]
    fn test_callback_converts_into_observer() {
        let observable = Observable::<u8>::new();
        let observer = observable.pipe_to(|_: &u8| {}).unwrap();
        assert!(observer.observing(&observable));
        assert!(!observer.activated());
    }

    #[test]
    fn test_released_observables_are_pruned() {
        let kept = Observable::<u8>::new();
        let released = Observable::<u8>::new();
        let observer = Observer::new(|_: &u8| {});
        observer.observe_all([&kept, &released]).unwrap().activate().unwrap();

        drop(released);
        let live = observer.observables();
        assert_eq!(live.len(), 1);
        assert!(live[0].ptr_eq(&kept));

        observer.deactivate();
        assert!(!kept.observed());
    }

    #[test]
    fn test_observer_does_not_keep_observable_alive() {
        let (observable, ctx) = Observable::<u8>::with_context();
        let observer = Observer::new(|_: &u8| {});
        observer.observe(&observable).unwrap().activate().unwrap();

        drop(observable);
        assert!(ctx.observable().is_none());
        assert!(observer.observables().is_empty());
    }

    #[test]
    fn test_weak_observer_tracks_liveness() {
        let observer = Observer::new(|_: &u8| {});
        let weak = observer.downgrade();
        assert_eq!(weak.id(), observer.id());
        assert!(weak.is_alive());
        drop(observer);
        assert!(!weak.is_alive());
    }
}
