//! # Herald
//!
//! A synchronous, push-based notification kernel: observables broadcast
//! values to linked observers, pipes chain them into processing graphs, and
//! finite-state observables add a `next -> final` lifecycle with replay
//! caching for late observers.
//!
//! ## Core Concepts
//!
//! - **Observables**: Broadcast values to every linked observer, in order
//! - **Observers**: Record observables and link to them while activated
//! - **Pipes**: An observer/observable pair that relays and transforms
//! - **Notifications**: Named values on a single observable
//! - **Finite state**: One final state, with a cache mode deciding replay
//!
//! ## Example
//!
//! ```
//! use herald::{pipe, CacheMode, FiniteStateObservable};
//! use std::sync::{Arc, Mutex};
//!
//! let (source, ctx) = FiniteStateObservable::<u32, String>::new(CacheMode::Cache);
//! ctx.next(20)?;
//!
//! // double every `next` value on its way out
//! let doubled = pipe::map(|n: &herald::FsoNotification<u32, String>| {
//!     n.value().value().map(|v| v * 2)
//! });
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! source
//!     .observable()
//!     .pipe_through(&doubled)?
//!     .pipe_to(move |v: &Option<u32>| sink.lock().unwrap().extend(*v))?
//!     .activate()?;
//!
//! ctx.next(21)?;
//! assert_eq!(*seen.lock().unwrap(), vec![40, 42]);
//! # Ok::<(), herald::HeraldError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod finite_state;
pub mod notifications;
pub mod pipe;
pub mod sources;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use crate::core::{
    IntoObserver, Observable, ObservableContext, ObserveHook, Observer, SharedHook,
};
pub use config::{FiniteStateConfig, PipeConfig};
pub use error::{HeraldError, Result};
pub use finite_state::{
    FiniteStateObservable, FsoContext, FsoNotification, Hook, Payload, Producer,
};
pub use notifications::{Notification, NotificationsObservable};
pub use pipe::{ActivationMode, Pipe, PipeParts};
pub use sources::{from_iter, DistinctValueObservable};
pub use subscriptions::{subscribe_channel, DropReason, SubscriptionConfig, SubscriptionHandle};
pub use types::*;
