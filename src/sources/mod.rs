//! Ready-made observable sources.
//!
//! - [`from_iter`]: a finite-state observable pulling from an iterator
//!   while it is observed
//! - [`DistinctValueObservable`]: a current value that broadcasts changes

mod distinct;
mod iter;

pub use distinct::DistinctValueObservable;
pub use iter::from_iter;
