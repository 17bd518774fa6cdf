//! Pipes: observer/observable pairs with an automatic activation lifecycle.
//!
//! A pipe's observer is activated when the pipe's observable becomes
//! observed and deactivated when it stops being observed, so composing
//! pipes builds chains that only hold upstream links while someone is
//! listening at the end.

mod stage;
mod transform;

pub use stage::{ActivationMode, Pipe, PipeParts};
pub use transform::{filter, inspect, map};
