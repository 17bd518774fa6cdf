//! Core types for the notification engine.

use crate::error::HeraldError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the notification carrying regular values.
pub const NEXT: &str = "next";

/// Name of the successful terminal notification.
pub const COMPLETE: &str = "complete";

/// Name of the failed terminal notification.
pub const ERROR: &str = "error";

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_OBSERVABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an observer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an observable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservableId(pub u64);

impl ObservableId {
    pub(crate) fn next() -> Self {
        ObservableId(NEXT_OBSERVABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservableId({})", self.0)
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replay policy of a finite-state observable.
///
/// | mode                             | buffers `next` + final | buffers other names |
/// |----------------------------------|------------------------|---------------------|
/// | `once`, `uniq`                   | no                     | no                  |
/// | `cache`, `cache-per-observer`    | yes                    | no                  |
/// | `cache-final-state[-per-observer]` | final only           | no                  |
/// | `cache-all`, `cache-all-per-observer` | yes               | yes                 |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    #[default]
    Once,
    Uniq,
    Cache,
    CachePerObserver,
    CacheFinalState,
    CacheFinalStatePerObserver,
    CacheAll,
    CacheAllPerObserver,
}

impl CacheMode {
    /// Every mode, in declaration order.
    pub const ALL: [CacheMode; 8] = [
        CacheMode::Once,
        CacheMode::Uniq,
        CacheMode::Cache,
        CacheMode::CachePerObserver,
        CacheMode::CacheFinalState,
        CacheMode::CacheFinalStatePerObserver,
        CacheMode::CacheAll,
        CacheMode::CacheAllPerObserver,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheMode::Once => "once",
            CacheMode::Uniq => "uniq",
            CacheMode::Cache => "cache",
            CacheMode::CachePerObserver => "cache-per-observer",
            CacheMode::CacheFinalState => "cache-final-state",
            CacheMode::CacheFinalStatePerObserver => "cache-final-state-per-observer",
            CacheMode::CacheAll => "cache-all",
            CacheMode::CacheAllPerObserver => "cache-all-per-observer",
        }
    }

    /// Replay starts from a remembered offset for each observer.
    pub fn is_per_observer(self) -> bool {
        matches!(
            self,
            CacheMode::CachePerObserver
                | CacheMode::CacheFinalStatePerObserver
                | CacheMode::CacheAllPerObserver
        )
    }

    fn is_cache_all(self) -> bool {
        matches!(self, CacheMode::CacheAll | CacheMode::CacheAllPerObserver)
    }

    /// Whether a notification should enter the replay buffer.
    pub fn buffers(self, is_next: bool, is_final: bool) -> bool {
        match self {
            CacheMode::Once | CacheMode::Uniq => false,
            CacheMode::Cache | CacheMode::CachePerObserver => is_next || is_final,
            CacheMode::CacheFinalState | CacheMode::CacheFinalStatePerObserver => is_final,
            CacheMode::CacheAll | CacheMode::CacheAllPerObserver => true,
        }
    }

    /// Informational notifications still flow after the final state.
    pub fn passes_info_after_final(self) -> bool {
        self.is_cache_all()
    }

    /// The buffer survives a full unobserve/reobserve cycle.
    pub fn retains_across_cycles(self) -> bool {
        self.is_per_observer()
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheMode {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| HeraldError::UnknownMode(s.to_string()))
    }
}

/// Lifecycle state of a finite-state observable.
///
/// Starts at `Next` and moves exactly once to a terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Next,
    Complete,
    Error,
    /// Custom terminal state such as `abort`.
    Other(Cow<'static, str>),
}

impl State {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            NEXT => State::Next,
            COMPLETE => State::Complete,
            ERROR => State::Error,
            other => State::Other(Cow::Owned(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            State::Next => NEXT,
            State::Complete => COMPLETE,
            State::Error => ERROR,
            State::Other(name) => name,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, State::Next)
    }
}

impl Default for State {
    fn default() -> Self {
        State::Next
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in CacheMode::ALL {
            assert_eq!(mode.as_str().parse::<CacheMode>().unwrap(), mode);
        }
        assert!(matches!(
            "cache-some".parse::<CacheMode>(),
            Err(HeraldError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_mode_serde_matches_display() {
        let json = serde_json::to_string(&CacheMode::CacheFinalStatePerObserver).unwrap();
        assert_eq!(json, "\"cache-final-state-per-observer\"");
    }

    #[test]
    fn test_buffer_table() {
        assert!(!CacheMode::Once.buffers(true, false));
        assert!(!CacheMode::Uniq.buffers(false, true));
        assert!(CacheMode::Cache.buffers(true, false));
        assert!(!CacheMode::Cache.buffers(false, false));
        assert!(!CacheMode::CacheFinalState.buffers(true, false));
        assert!(CacheMode::CacheFinalStatePerObserver.buffers(false, true));
        assert!(CacheMode::CacheAll.buffers(false, false));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(State::from_name("next"), State::Next);
        assert_eq!(State::from_name("error"), State::Error);
        assert_eq!(State::from_name("abort").as_str(), "abort");
        assert!(State::Complete.is_final());
        assert!(!State::default().is_final());
    }
}
