//! Finite-state observables.
//!
//! A [`FiniteStateObservable`] emits `next` notifications until it moves,
//! exactly once, to a final state (`complete`, `error`, or a configured
//! custom name). Its [`CacheMode`](crate::CacheMode) decides what is kept
//! for observers that join later:
//!
//! - `once`, `uniq`: nothing; `uniq` also refuses observers after the end
//! - `cache`: `next` and final notifications
//! - `cache-final-state`: the final notification only
//! - `cache-all`: everything, including informational names
//!
//! The `*-per-observer` variants remember how far each observer got and
//! replay only what it missed when it rejoins.

mod cache;
mod observable;
mod types;

pub use observable::{FiniteStateObservable, FsoContext};
pub use types::{FsoNotification, Hook, Payload, Producer};
