//! Typed push sources and the re-entrancy-safe broadcast algorithm.

use super::observer::{IntoObserver, Observer};
use crate::error::Result;
use crate::pipe::Pipe;
use crate::types::ObservableId;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Reacts to link transitions and broadcasts of an observable.
///
/// `on_observe` runs after the observer has been added to the observer list,
/// `on_unobserve` after it has been removed. Both fire exactly once per
/// transition. Returning an error from `on_observe` rolls the link back.
pub trait ObserveHook<T>: Send + Sync {
    fn on_observe(&self, _observable: &Observable<T>, _observer: &Observer<T>) -> Result<()> {
        Ok(())
    }

    fn on_unobserve(&self, _observable: &Observable<T>, _observer: &Observer<T>) {}

    /// Called once per broadcast value, right before it is delivered.
    fn on_broadcast(&self, _value: &T) {}
}

/// Shared, type-erased link hook.
pub type SharedHook<T> = Arc<dyn ObserveHook<T>>;

/// Delivery state guarded by the observable's lock.
struct BroadcastState<T> {
    /// Linked observers in delivery order.
    observers: Vec<Observer<T>>,
    /// A broadcast is in progress on this observable.
    emitting: bool,
    /// Values emitted re-entrantly while `emitting` was set.
    pending: VecDeque<T>,
}

pub(crate) struct ObservableInner<T> {
    id: ObservableId,
    hook: RwLock<Option<SharedHook<T>>>,
    state: Mutex<BroadcastState<T>>,
    /// Set once a pipe has taken ownership of this observable.
    piped: AtomicBool,
}

/// A typed push source.
///
/// Cloning yields another handle to the same source.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Observable<T> {
    /// Create an observable without hooks.
    pub fn new() -> Self {
        Self::from_hook(None)
    }

    /// Create an observable with a link hook.
    pub fn with_hook(hook: impl ObserveHook<T> + 'static) -> Self {
        Self::from_hook(Some(Arc::new(hook)))
    }

    /// Create an observable and hand its producer context to `setup`.
    ///
    /// The hook returned by `setup`, if any, is installed before the
    /// observable is returned.
    pub fn create<F>(setup: F) -> Self
    where
        F: FnOnce(ObservableContext<T>) -> Option<SharedHook<T>>,
    {
        let observable = Self::new();
        let hook = setup(ObservableContext {
            observable: observable.downgrade(),
        });
        *observable.inner.hook.write() = hook;
        observable
    }

    /// Create an observable together with its producer context.
    pub fn with_context() -> (Self, ObservableContext<T>) {
        let observable = Self::new();
        let context = ObservableContext {
            observable: observable.downgrade(),
        };
        (observable, context)
    }

    fn from_hook(hook: Option<SharedHook<T>>) -> Self {
        let id = ObservableId::next();
        trace!(observable = %id, "observable created");
        Self {
            inner: Arc::new(ObservableInner {
                id,
                hook: RwLock::new(hook),
                state: Mutex::new(BroadcastState {
                    observers: Vec::new(),
                    emitting: false,
                    pending: VecDeque::new(),
                }),
                piped: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    /// Linked observers, in delivery order.
    pub fn observers(&self) -> Vec<Observer<T>> {
        self.inner.state.lock().observers.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.state.lock().observers.len()
    }

    /// Whether at least one observer is linked.
    pub fn observed(&self) -> bool {
        self.observer_count() > 0
    }

    /// Make `observer` observe this observable and return it.
    ///
    /// Accepts an [`Observer`] or a plain callback. The observer is not
    /// activated; an observer that is already active links immediately.
    pub fn pipe_to(&self, observer: impl IntoObserver<T>) -> Result<Observer<T>> {
        let observer = observer.into_observer();
        observer.observe(self)?;
        Ok(observer)
    }

    /// Feed this observable into `pipe` and return the pipe's output.
    pub fn pipe_through<O: Send + 'static>(&self, pipe: &Pipe<T, O>) -> Result<Observable<O>>
    where
        T: Send,
    {
        pipe.observer().observe(self)?;
        Ok(pipe.observable().clone())
    }

    /// Feed this observable into `pipe` and return the pipe itself.
    pub fn pipe<O: Send + 'static>(&self, pipe: &Pipe<T, O>) -> Result<Pipe<T, O>>
    where
        T: Send,
    {
        pipe.observer().observe(self)?;
        Ok(pipe.clone())
    }

    /// Make every given observer observe this observable.
    pub fn observed_by<'a, I>(&self, observers: I) -> Result<&Self>
    where
        I: IntoIterator<Item = &'a Observer<T>>,
    {
        for observer in observers {
            observer.observe(self)?;
        }
        Ok(self)
    }

    pub fn ptr_eq(&self, other: &Observable<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn hook(&self) -> Option<SharedHook<T>> {
        self.inner.hook.read().clone()
    }

    /// Replace the hook with one built around the current hook.
    pub(crate) fn chain_hook<F>(&self, wrap: F)
    where
        F: FnOnce(Option<SharedHook<T>>) -> SharedHook<T>,
    {
        let mut slot = self.inner.hook.write();
        let previous = slot.take();
        *slot = Some(wrap(previous));
    }

    /// Mark this observable as a pipe output. Returns false if already claimed.
    pub(crate) fn claim_for_pipe(&self) -> bool {
        !self.inner.piped.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn release_pipe_claim(&self) {
        self.inner.piped.store(false, Ordering::SeqCst);
    }

    /// Add `observer` to the observer list and run the observe hook.
    ///
    /// Linking an already linked observer is a no-op.
    pub(crate) fn link(&self, observer: &Observer<T>) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.observers.iter().any(|o| o.ptr_eq(observer)) {
                return Ok(());
            }
            state.observers.push(observer.clone());
        }
        trace!(observable = %self.id(), observer = %observer.id(), "linked");

        if let Some(hook) = self.hook() {
            if let Err(e) = hook.on_observe(self, observer) {
                self.inner
                    .state
                    .lock()
                    .observers
                    .retain(|o| !o.ptr_eq(observer));
                trace!(observable = %self.id(), observer = %observer.id(), error = %e, "link rejected");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove `observer` from the observer list and run the unobserve hook.
    pub(crate) fn unlink(&self, observer: &Observer<T>) {
        let removed = {
            let mut state = self.inner.state.lock();
            match state.observers.iter().position(|o| o.ptr_eq(observer)) {
                Some(pos) => {
                    state.observers.remove(pos);
                    true
                }
                None => false,
            }
        };

        if removed {
            trace!(observable = %self.id(), observer = %observer.id(), "unlinked");
            if let Some(hook) = self.hook() {
                hook.on_unobserve(self, observer);
            }
        }
    }

    /// Broadcast `value` to every linked observer.
    ///
    /// Re-entrant calls made while a broadcast is running are queued and
    /// delivered, in order, once the current value has reached every
    /// observer of its snapshot.
    pub(crate) fn emit(&self, value: T) {
        {
            let mut state = self.inner.state.lock();
            if state.emitting {
                state.pending.push_back(value);
                trace!(observable = %self.id(), queued = state.pending.len(), "re-entrant emit queued");
                return;
            }
            state.emitting = true;
        }

        let _guard = EmitGuard { inner: &self.inner };
        self.broadcast(&value);
        self.drain_pending();
    }

    /// Deliver `values` to `observer` alone, as one exclusive broadcast.
    ///
    /// Emits made from inside these deliveries are queued behind them.
    pub(crate) fn deliver_exclusive(&self, observer: &Observer<T>, values: &[T]) {
        let nested = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.emitting, true)
        };
        if nested {
            // the running broadcast drains the queue
            for value in values {
                observer.deliver(value, Some(self));
            }
            return;
        }

        let _guard = EmitGuard { inner: &self.inner };
        for value in values {
            observer.deliver(value, Some(self));
        }
        self.drain_pending();
    }

    fn broadcast(&self, value: &T) {
        if let Some(hook) = self.hook() {
            hook.on_broadcast(value);
        }
        let snapshot = self.inner.state.lock().observers.clone();
        for observer in &snapshot {
            observer.deliver(value, Some(self));
        }
    }

    /// Broadcast queued values until the queue is empty, then clear `emitting`.
    fn drain_pending(&self) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                let next = state.pending.pop_front();
                if next.is_none() {
                    state.emitting = false;
                }
                next
            };
            match next {
                Some(value) => self.broadcast(&value),
                None => break,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_emitting(&self) -> bool {
        self.inner.state.lock().emitting
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("observers", &self.inner.state.lock().observers.len())
            .finish()
    }
}

/// Resets the broadcast flag if a callback unwinds mid-broadcast.
struct EmitGuard<'a, T> {
    inner: &'a ObservableInner<T>,
}

impl<T> Drop for EmitGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.inner.state.lock();
            state.emitting = false;
            state.pending.clear();
        }
    }
}

/// Non-owning observable handle.
pub(crate) struct WeakObservable<T> {
    inner: Weak<ObservableInner<T>>,
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakObservable<T> {
    pub(crate) fn upgrade(&self) -> Option<Observable<T>> {
        self.inner.upgrade().map(|inner| Observable { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether this handle points at `observable`.
    pub(crate) fn is(&self, observable: &Observable<T>) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&observable.inner))
    }
}

/// Producer-facing handle used to emit into an observable.
///
/// Holds the observable weakly so a producer hook can keep its context
/// without keeping the observable alive.
pub struct ObservableContext<T> {
    observable: WeakObservable<T>,
}

impl<T> Clone for ObservableContext<T> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
        }
    }
}

impl<T: 'static> ObservableContext<T> {
    /// Broadcast a value. Dropped with a warning if the observable is gone.
    pub fn emit(&self, value: T) {
        match self.observable.upgrade() {
            Some(observable) => observable.emit(value),
            None => warn!("emit on dropped observable ignored"),
        }
    }

    pub fn observable(&self) -> Option<Observable<T>> {
        self.observable.upgrade()
    }
}
