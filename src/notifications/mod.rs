//! Named notifications multiplexed over a single observable.

mod notification;
mod observable;

pub use notification::Notification;
pub use observable::NotificationsObservable;
