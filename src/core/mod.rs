//! Observable and Observer primitives.
//!
//! An [`Observable`] keeps an ordered list of linked [`Observer`]s and
//! broadcasts values to them synchronously. An observer records the
//! observables it observes and is linked to them only while activated:
//!
//! ```
//! use herald::{Observable, Observer};
//!
//! let (numbers, producer) = Observable::<i32>::with_context();
//! let printer = Observer::new(|n: &i32| println!("got {n}"));
//!
//! printer.observe(&numbers)?.activate()?;
//! producer.emit(1);
//! # Ok::<(), herald::HeraldError>(())
//! ```
//!
//! Values emitted from inside a callback while a broadcast is running are
//! queued and delivered after the current value, never interleaved.

mod observable;
mod observer;

pub use observable::{Observable, ObservableContext, ObserveHook, SharedHook};
pub use observer::{IntoObserver, Observer};
pub(crate) use observer::WeakObserver;
