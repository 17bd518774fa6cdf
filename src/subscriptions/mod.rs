//! Channel-backed subscriptions.
//!
//! [`subscribe_channel`] attaches an observer that forwards every value into
//! a bounded `crossbeam-channel`, so values can be consumed on another
//! thread. Subscribers that cannot keep up are dropped: a full buffer or a
//! dropped receiver disconnects the forwarding observer.
//!
//! # Example
//!
//! ```
//! use herald::subscriptions::{subscribe_channel, SubscriptionConfig};
//! use herald::Observable;
//!
//! let (numbers, ctx) = Observable::<u32>::with_context();
//! let handle = subscribe_channel(&numbers, SubscriptionConfig::default())?;
//!
//! ctx.emit(1);
//! ctx.emit(2);
//! assert_eq!(handle.drain(), vec![1, 2]);
//! # Ok::<(), herald::HeraldError>(())
//! ```

mod sink;
mod types;

pub use sink::subscribe_channel;
pub use types::{DropReason, SubscriptionConfig, SubscriptionHandle};
