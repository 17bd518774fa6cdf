//! Emit gate and replay buffer of a finite-state observable.
//!
//! Buffered notifications are addressed by absolute index: `values[i]` is
//! notification `discarded + i`. Clearing the cache advances `discarded`, so
//! offsets remembered for departed observers stay meaningful afterwards.

use crate::core::{Observer, WeakObserver};
use crate::error::{HeraldError, Result};
use crate::types::{CacheMode, ObserverId, State, NEXT};
use std::collections::{HashMap, VecDeque};
use tracing::trace;

pub(crate) struct CacheState<N> {
    mode: CacheMode,
    state: State,
    values: Vec<N>,
    discarded: usize,
    /// End of the prefix whose broadcast has started.
    delivered: usize,
    /// Buffer slot of every gated notification not yet broadcast, FIFO.
    in_flight: VecDeque<Option<usize>>,
    /// Next index to replay for observers that left, per-observer modes only.
    offsets: HashMap<ObserverId, (WeakObserver<N>, usize)>,
}

impl<N: Clone + 'static> CacheState<N> {
    pub(crate) fn new(mode: CacheMode) -> Self {
        Self {
            mode,
            state: State::Next,
            values: Vec::new(),
            discarded: 0,
            delivered: 0,
            in_flight: VecDeque::new(),
            offsets: HashMap::new(),
        }
    }

    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn values(&self) -> &[N] {
        &self.values
    }

    fn end(&self) -> usize {
        self.discarded + self.values.len()
    }

    /// Decide whether `notification` may be emitted, buffering it and moving
    /// to the final state as the mode dictates.
    ///
    /// Returns `Ok(false)` for informational notifications dropped after the
    /// final state.
    pub(crate) fn gate(&mut self, name: &str, is_final: bool, notification: &N) -> Result<bool> {
        let is_next = name == NEXT;

        if self.state.is_final() {
            if is_next || is_final {
                return Err(HeraldError::EmitAfterFinalState {
                    name: name.to_string(),
                    state: self.state.to_string(),
                });
            }
            if !self.mode.passes_info_after_final() {
                trace!(name, state = %self.state, "notification after final state dropped");
                return Ok(false);
            }
        }

        let slot = if self.mode.buffers(is_next, is_final) {
            self.values.push(notification.clone());
            Some(self.end() - 1)
        } else {
            None
        };
        self.in_flight.push_back(slot);

        if is_final {
            self.state = State::from_name(name);
        }
        Ok(true)
    }

    /// A gated notification is about to be broadcast.
    pub(crate) fn on_broadcast(&mut self) {
        if let Some(Some(slot)) = self.in_flight.pop_front() {
            self.delivered = self.delivered.max(slot + 1);
        }
    }

    /// Reject links that `uniq` mode no longer allows.
    pub(crate) fn check_observe(&self) -> Result<()> {
        if self.mode == CacheMode::Uniq && self.state.is_final() {
            return Err(HeraldError::UniqClosed(self.state.to_string()));
        }
        Ok(())
    }

    /// Notifications to replay to a newly linked observer.
    pub(crate) fn replay_for(&mut self, observer: &Observer<N>) -> Vec<N> {
        let from = if self.mode.is_per_observer() {
            self.offsets
                .get(&observer.id())
                .map(|(_, offset)| *offset)
                .unwrap_or(0)
        } else {
            0
        };
        let start = from.max(self.discarded);
        let stop = self.delivered;

        let replay = if start < stop {
            self.values[start - self.discarded..stop - self.discarded].to_vec()
        } else {
            Vec::new()
        };

        if self.mode.is_per_observer() {
            self.remember_at(observer, from.max(stop));
        }
        replay
    }

    /// Record how far a departing observer got.
    pub(crate) fn remember(&mut self, observer: &Observer<N>) {
        if self.mode.is_per_observer() {
            self.remember_at(observer, self.delivered);
        }
    }

    fn remember_at(&mut self, observer: &Observer<N>, offset: usize) {
        self.offsets.retain(|_, (weak, _)| weak.is_alive());
        let weak = observer.downgrade();
        self.offsets.insert(weak.id(), (weak, offset));
    }

    pub(crate) fn check_clear(&self, observed: bool) -> Result<()> {
        if self.state.is_final() {
            return Err(HeraldError::ClearCacheAfterFinalState(self.state.to_string()));
        }
        if observed {
            return Err(HeraldError::ClearCacheWhileObserved);
        }
        Ok(())
    }

    /// Drop the buffer. Remembered offsets are kept.
    pub(crate) fn clear(&mut self) {
        self.discarded = self.end();
        self.values.clear();
    }

    #[cfg(test)]
    fn remembered(&self) -> usize {
        self.offsets.len()
    }
}
