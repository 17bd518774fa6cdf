//! Payloads and producer hooks for finite-state observables.

use crate::notifications::Notification;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried by a finite-state notification.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload<T, E> {
    /// A `next` value or an informational value.
    Value(T),
    /// The reason attached to `error` or a custom terminal state.
    Reason(E),
    /// No payload, as for `complete`.
    Empty,
}

impl<T, E> Payload<T, E> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Payload::Reason(e) => Some(e),
            _ => None,
        }
    }
}

/// Notification type broadcast by a finite-state observable.
pub type FsoNotification<T, E> = Notification<Payload<T, E>>;

/// Producer side of a finite-state observable.
///
/// `on_observed` runs when the observable gains its first observer.
/// `on_unobserved` runs when it loses its last observer while still in the
/// `next` state; the producer should stop its underlying work there.
pub trait Producer: Send + Sync {
    fn on_observed(&self) {}

    fn on_unobserved(&self) {}
}

type Callback = Box<dyn Fn() + Send + Sync>;

/// A [`Producer`] assembled from closures.
///
/// ```
/// use herald::Hook;
///
/// let hook = Hook::new()
///     .when_observed(|| println!("start"))
///     .when_unobserved(|| println!("stop"));
/// ```
#[derive(Default)]
pub struct Hook {
    observed: Option<Callback>,
    unobserved: Option<Callback>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when_observed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.observed = Some(Box::new(f));
        self
    }

    pub fn when_unobserved(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.unobserved = Some(Box::new(f));
        self
    }
}

impl Producer for Hook {
    fn on_observed(&self) {
        if let Some(f) = &self.observed {
            f();
        }
    }

    fn on_unobserved(&self) {
        if let Some(f) = &self.unobserved {
            f();
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("observed", &self.observed.is_some())
            .field("unobserved", &self.unobserved.is_some())
            .finish()
    }
}
