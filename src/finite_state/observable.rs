//! Finite-state observable: a notifications observable with a one-way
//! `next -> final` state machine and replay caching.

use super::cache::CacheState;
use super::types::{FsoNotification, Payload, Producer};
use crate::config::FiniteStateConfig;
use crate::core::{
    IntoObserver, Observable, ObservableContext, ObserveHook, Observer, SharedHook,
};
use crate::error::{HeraldError, Result};
use crate::notifications::{Notification, NotificationsObservable};
use crate::types::{CacheMode, State, COMPLETE, ERROR, NEXT};
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct FsoShared<T, E> {
    config: FiniteStateConfig,
    cache: Mutex<CacheState<FsoNotification<T, E>>>,
    producer: RwLock<Option<Arc<dyn Producer>>>,
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> FsoShared<T, E> {
    fn producer(&self) -> Option<Arc<dyn Producer>> {
        self.producer.read().clone()
    }

    /// Run the emit gate, then broadcast.
    fn emit(
        &self,
        observable: &Observable<FsoNotification<T, E>>,
        notification: FsoNotification<T, E>,
    ) -> Result<()> {
        let is_final = self.config.is_final(notification.name());
        let emitted = self
            .cache
            .lock()
            .gate(notification.name(), is_final, &notification)?;

        if emitted {
            if is_final {
                debug!(observable = %observable.id(), state = notification.name(), "final state reached");
            }
            observable.emit(notification);
        }
        Ok(())
    }

    fn clear_cache(&self, observable: &Observable<FsoNotification<T, E>>) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.check_clear(observable.observed())?;
        cache.clear();
        debug!(observable = %observable.id(), "cache cleared");
        Ok(())
    }
}

/// Replays the cache to joining observers and drives the producer.
struct FsoHook<T, E> {
    shared: Arc<FsoShared<T, E>>,
}

impl<T, E> ObserveHook<FsoNotification<T, E>> for FsoHook<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_observe(
        &self,
        observable: &Observable<FsoNotification<T, E>>,
        observer: &Observer<FsoNotification<T, E>>,
    ) -> Result<()> {
        let replay = {
            let mut cache = self.shared.cache.lock();
            cache.check_observe()?;
            cache.replay_for(observer)
        };

        if !replay.is_empty() {
            trace!(observable = %observable.id(), observer = %observer.id(), count = replay.len(), "replaying cache");
            observable.deliver_exclusive(observer, &replay);
        }

        // a producer that already finished is never restarted
        let in_next = !self.shared.cache.lock().state().is_final();
        if in_next && observable.observer_count() == 1 {
            if let Some(producer) = self.shared.producer() {
                producer.on_observed();
            }
        }
        Ok(())
    }

    fn on_unobserve(
        &self,
        observable: &Observable<FsoNotification<T, E>>,
        observer: &Observer<FsoNotification<T, E>>,
    ) {
        let in_next = {
            let mut cache = self.shared.cache.lock();
            cache.remember(observer);
            !cache.state().is_final()
        };
        if observable.observed() || !in_next {
            return;
        }

        if let Some(producer) = self.shared.producer() {
            producer.on_unobserved();
        }

        if !self.shared.config.mode.retains_across_cycles() && !observable.observed() {
            // the producer may have finished while stopping; a final cache stays
            if let Err(e) = self.shared.clear_cache(observable) {
                trace!(observable = %observable.id(), error = %e, "cache kept");
            }
        }
    }

    fn on_broadcast(&self, _value: &FsoNotification<T, E>) {
        self.shared.cache.lock().on_broadcast();
    }
}

/// A notifications observable that ends in exactly one final state and
/// replays past notifications to late observers according to its
/// [`CacheMode`].
///
/// ```
/// use herald::{CacheMode, FiniteStateObservable};
///
/// let (source, ctx) = FiniteStateObservable::<u32, String>::new(CacheMode::Cache);
/// ctx.next(1)?;
/// ctx.complete()?;
///
/// // a late listener still sees both notifications
/// source.on_next(|v| assert_eq!(*v, 1))?;
/// assert!(source.state().is_final());
/// # Ok::<(), herald::HeraldError>(())
/// ```
pub struct FiniteStateObservable<T, E = String> {
    notifications: NotificationsObservable<Payload<T, E>>,
    shared: Arc<FsoShared<T, E>>,
}

impl<T, E> Clone for FiniteStateObservable<T, E> {
    fn clone(&self) -> Self {
        Self {
            notifications: self.notifications.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> FiniteStateObservable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create from a producer factory.
    ///
    /// `factory` receives the producer context and may return a
    /// [`Producer`] reacting to observed/unobserved transitions.
    pub fn create<F>(config: impl Into<FiniteStateConfig>, factory: F) -> Self
    where
        F: FnOnce(FsoContext<T, E>) -> Option<Box<dyn Producer>>,
    {
        let (observable, context) = Self::new(config);
        if let Some(producer) = factory(context) {
            *observable.shared.producer.write() = Some(Arc::from(producer));
        }
        observable
    }

    /// Create without a producer, returning the context to emit with.
    pub fn new(config: impl Into<FiniteStateConfig>) -> (Self, FsoContext<T, E>) {
        let config = config.into();
        let shared = Arc::new(FsoShared {
            cache: Mutex::new(CacheState::new(config.mode)),
            config,
            producer: RwLock::new(None),
        });

        let hook_shared = Arc::clone(&shared);
        let notifications = NotificationsObservable::with_hook(move |_| {
            let hook: SharedHook<FsoNotification<T, E>> = Arc::new(FsoHook {
                shared: hook_shared,
            });
            Some(hook)
        });

        let context = FsoContext {
            emitter: notifications.context().clone(),
            shared: Arc::downgrade(&shared),
        };
        debug!(observable = %notifications.observable().id(), mode = %shared.config.mode, "finite-state observable created");

        (
            Self {
                notifications,
                shared,
            },
            context,
        )
    }

    pub fn state(&self) -> State {
        self.shared.cache.lock().state().clone()
    }

    pub fn mode(&self) -> CacheMode {
        self.shared.config.mode
    }

    pub fn config(&self) -> &FiniteStateConfig {
        &self.shared.config
    }

    pub fn observable(&self) -> &Observable<FsoNotification<T, E>> {
        self.notifications.observable()
    }

    pub fn observed(&self) -> bool {
        self.observable().observed()
    }

    /// Snapshot of the replay buffer.
    pub fn cached_values(&self) -> Vec<FsoNotification<T, E>> {
        self.shared.cache.lock().values().to_vec()
    }

    /// Emit a notification by name through the emit gate.
    pub fn dispatch(
        &self,
        name: impl Into<Cow<'static, str>>,
        payload: Payload<T, E>,
    ) -> Result<()> {
        self.shared
            .emit(self.observable(), Notification::new(name, payload))
    }

    /// Make `observer` observe this observable.
    ///
    /// Fails up front when `uniq` mode has already reached its final state.
    pub fn pipe_to(
        &self,
        observer: impl IntoObserver<FsoNotification<T, E>>,
    ) -> Result<Observer<FsoNotification<T, E>>> {
        self.shared.cache.lock().check_observe()?;
        self.observable().pipe_to(observer)
    }

    /// Listen to one notification name; the listener is activated.
    pub fn on<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        callback: F,
    ) -> Result<Observer<FsoNotification<T, E>>>
    where
        F: Fn(&Payload<T, E>) + Send + Sync + 'static,
    {
        self.notifications.on(name, callback)
    }

    /// Alias of [`FiniteStateObservable::on`].
    pub fn add_listener<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        callback: F,
    ) -> Result<Observer<FsoNotification<T, E>>>
    where
        F: Fn(&Payload<T, E>) + Send + Sync + 'static,
    {
        self.on(name, callback)
    }

    pub fn on_next<F>(&self, callback: F) -> Result<Observer<FsoNotification<T, E>>>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on(NEXT, move |payload| {
            if let Some(value) = payload.value() {
                callback(value);
            }
        })
    }

    pub fn on_complete<F>(&self, callback: F) -> Result<Observer<FsoNotification<T, E>>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(COMPLETE, move |_| callback())
    }

    pub fn on_error<F>(&self, callback: F) -> Result<Observer<FsoNotification<T, E>>>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.on(ERROR, move |payload| {
            if let Some(reason) = payload.reason() {
                callback(reason);
            }
        })
    }
}

impl<T: 'static, E: 'static> fmt::Debug for FiniteStateObservable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiniteStateObservable")
            .field("observable", self.notifications.observable())
            .field("mode", &self.shared.config.mode)
            .finish()
    }
}

/// Producer-facing handle of a [`FiniteStateObservable`].
///
/// Every emitting method runs the emit gate: emitting `next` or a final
/// notification after the final state is an error.
pub struct FsoContext<T, E> {
    emitter: ObservableContext<FsoNotification<T, E>>,
    shared: Weak<FsoShared<T, E>>,
}

impl<T, E> Clone for FsoContext<T, E> {
    fn clone(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T, E> FsoContext<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    #[allow(clippy::type_complexity)]
    fn upgrade(&self) -> Result<(Observable<FsoNotification<T, E>>, Arc<FsoShared<T, E>>)> {
        match (self.emitter.observable(), self.shared.upgrade()) {
            (Some(observable), Some(shared)) => Ok((observable, shared)),
            _ => Err(HeraldError::ObservableDropped),
        }
    }

    fn emit(&self, notification: FsoNotification<T, E>) -> Result<()> {
        let (observable, shared) = self.upgrade()?;
        shared.emit(&observable, notification)
    }

    pub fn next(&self, value: T) -> Result<()> {
        self.emit(Notification::new(NEXT, Payload::Value(value)))
    }

    pub fn complete(&self) -> Result<()> {
        self.emit(Notification::new(COMPLETE, Payload::Empty))
    }

    pub fn error(&self, reason: E) -> Result<()> {
        self.emit(Notification::new(ERROR, Payload::Reason(reason)))
    }

    /// Move to a custom final state such as `abort`.
    pub fn finish(&self, name: impl Into<Cow<'static, str>>, payload: Payload<T, E>) -> Result<()> {
        let name = name.into();
        let (observable, shared) = self.upgrade()?;
        if !shared.config.is_final(&name) {
            return Err(HeraldError::NotFinalState(name.into_owned()));
        }
        shared.emit(&observable, Notification::new(name, payload))
    }

    /// Emit a notification by name, e.g. an informational `progress`.
    pub fn notify(&self, name: impl Into<Cow<'static, str>>, payload: Payload<T, E>) -> Result<()> {
        self.emit(Notification::new(name, payload))
    }

    /// Discard the replay buffer.
    ///
    /// Only allowed in the `next` state while nothing observes.
    pub fn clear_cache(&self) -> Result<()> {
        let (observable, shared) = self.upgrade()?;
        shared.clear_cache(&observable)
    }

    pub fn state(&self) -> Result<State> {
        let (_, shared) = self.upgrade()?;
        let state = shared.cache.lock().state().clone();
        Ok(state)
    }

    /// The observable this context emits into, if still alive.
    pub fn observable(&self) -> Option<FiniteStateObservable<T, E>> {
        let (observable, shared) = self.upgrade().ok()?;
        Some(FiniteStateObservable {
            notifications: NotificationsObservable::from_parts(observable, self.emitter.clone()),
            shared,
        })
    }
}
