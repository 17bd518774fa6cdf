//! Observable of named notifications.

use super::notification::Notification;
use crate::core::{Observable, ObservableContext, Observer, SharedHook};
use crate::error::Result;
use std::borrow::Cow;
use std::fmt;

/// An observable whose values are [`Notification`]s.
///
/// All names flow through one broadcast; listeners filter by name inside
/// their own callback.
pub struct NotificationsObservable<V> {
    observable: Observable<Notification<V>>,
    context: ObservableContext<Notification<V>>,
}

impl<V> Clone for NotificationsObservable<V> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
            context: self.context.clone(),
        }
    }
}

impl<V: 'static> Default for NotificationsObservable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> NotificationsObservable<V> {
    pub fn new() -> Self {
        let (observable, context) = Observable::with_context();
        Self {
            observable,
            context,
        }
    }

    /// Create with a link hook built from the emitting context.
    pub fn with_hook<F>(build: F) -> Self
    where
        F: FnOnce(ObservableContext<Notification<V>>) -> Option<SharedHook<Notification<V>>>,
    {
        let (observable, context) = Observable::with_context();
        if let Some(hook) = build(context.clone()) {
            observable.chain_hook(move |_| hook);
        }
        Self {
            observable,
            context,
        }
    }

    pub(crate) fn from_parts(
        observable: Observable<Notification<V>>,
        context: ObservableContext<Notification<V>>,
    ) -> Self {
        Self {
            observable,
            context,
        }
    }

    pub fn observable(&self) -> &Observable<Notification<V>> {
        &self.observable
    }

    pub(crate) fn context(&self) -> &ObservableContext<Notification<V>> {
        &self.context
    }

    /// Broadcast `{name, value}`.
    pub fn dispatch(&self, name: impl Into<Cow<'static, str>>, value: V) {
        self.context.emit(Notification::new(name, value));
    }

    /// Listen to one notification name.
    ///
    /// The returned observer is already observing and activated.
    pub fn on<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        callback: F,
    ) -> Result<Observer<Notification<V>>>
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let name = name.into();
        let observer = Observer::new(move |notification: &Notification<V>| {
            if notification.is(&name) {
                callback(notification.value());
            }
        });
        observer.observe(&self.observable)?.activate()?;
        Ok(observer)
    }

    /// Alias of [`NotificationsObservable::on`].
    pub fn add_listener<F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        callback: F,
    ) -> Result<Observer<Notification<V>>>
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.on(name, callback)
    }
}

impl<V> fmt::Debug for NotificationsObservable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationsObservable")
            .field("observable", &self.observable)
            .finish()
    }
}
