//! Pipe: an observer and an observable paired into one stage.

use crate::config::PipeConfig;
use crate::core::{Observable, ObserveHook, Observer, SharedHook};
use crate::error::{HeraldError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// How a pipe's observer is (de)activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationMode {
    /// Follow the pipe observable's observed state.
    Auto,
    /// Force the transition now and stop the opposite automatic transition.
    Manual,
}

/// What a pipe factory hands back.
pub struct PipeParts<I, O> {
    pub observer: Observer<I>,
    pub observable: Observable<O>,
}

struct PipeFlags {
    auto_activate: AtomicBool,
    auto_deactivate: AtomicBool,
}

impl PipeFlags {
    fn auto_activate(&self) -> bool {
        self.auto_activate.load(Ordering::SeqCst)
    }

    fn auto_deactivate(&self) -> bool {
        self.auto_deactivate.load(Ordering::SeqCst)
    }
}

/// Drives the pipe observer from the pipe observable's link transitions.
struct PipeHook<I, O> {
    previous: Option<SharedHook<O>>,
    observer: Observer<I>,
    flags: Arc<PipeFlags>,
}

impl<I: Send + 'static, O: Send + 'static> ObserveHook<O> for PipeHook<I, O> {
    fn on_observe(&self, observable: &Observable<O>, observer: &Observer<O>) -> Result<()> {
        if let Some(previous) = &self.previous {
            previous.on_observe(observable, observer)?;
        }
        if observable.observer_count() == 1
            && self.flags.auto_activate()
            && !self.observer.activated()
        {
            debug!(observable = %observable.id(), observer = %self.observer.id(), "pipe auto-activated");
            self.observer.activate()?;
        }
        Ok(())
    }

    fn on_unobserve(&self, observable: &Observable<O>, observer: &Observer<O>) {
        if let Some(previous) = &self.previous {
            previous.on_unobserve(observable, observer);
        }
        if !observable.observed() && self.flags.auto_deactivate() && self.observer.activated() {
            debug!(observable = %observable.id(), observer = %self.observer.id(), "pipe auto-deactivated");
            self.observer.deactivate();
        }
    }

    fn on_broadcast(&self, value: &O) {
        if let Some(previous) = &self.previous {
            previous.on_broadcast(value);
        }
    }
}

/// A transformation stage: values reach `observer`, results leave through
/// `observable`.
///
/// By default the observer activates when the observable gains its first
/// observer and deactivates when it loses the last one, so an unobserved
/// chain of pipes holds no upstream links.
pub struct Pipe<I, O> {
    observer: Observer<I>,
    observable: Observable<O>,
    flags: Arc<PipeFlags>,
}

impl<I, O> Clone for Pipe<I, O> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
            observable: self.observable.clone(),
            flags: Arc::clone(&self.flags),
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> Pipe<I, O> {
    /// Build a pipe from a factory with default (automatic) lifecycle.
    pub fn new<F>(factory: F) -> Result<Self>
    where
        F: FnOnce() -> PipeParts<I, O>,
    {
        Self::with_config(PipeConfig::default(), factory)
    }

    /// Build a pipe from a factory.
    ///
    /// Fails if the returned observable already belongs to another pipe.
    pub fn with_config<F>(config: PipeConfig, factory: F) -> Result<Self>
    where
        F: FnOnce() -> PipeParts<I, O>,
    {
        let PipeParts {
            observer,
            observable,
        } = factory();
        if !observable.claim_for_pipe() {
            return Err(HeraldError::InvalidPipe(format!(
                "observable {} already belongs to a pipe",
                observable.id()
            )));
        }
        // an observable observed before the pipe existed never saw a 0 -> 1 transition
        if config.auto_activate && observable.observed() && !observer.activated() {
            if let Err(e) = observer.activate() {
                observer.deactivate();
                observable.release_pipe_claim();
                return Err(e);
            }
        }
        let pipe = Self::assemble(config, observer, observable);
        debug!(observable = %pipe.observable.id(), observer = %pipe.observer.id(), "pipe created");
        Ok(pipe)
    }

    pub(crate) fn assemble(
        config: PipeConfig,
        observer: Observer<I>,
        observable: Observable<O>,
    ) -> Self {
        let flags = Arc::new(PipeFlags {
            auto_activate: AtomicBool::new(config.auto_activate),
            auto_deactivate: AtomicBool::new(config.auto_deactivate),
        });

        let hook_observer = observer.clone();
        let hook_flags = Arc::clone(&flags);
        observable.chain_hook(move |previous| {
            Arc::new(PipeHook {
                previous,
                observer: hook_observer,
                flags: hook_flags,
            })
        });

        Self {
            observer,
            observable,
            flags,
        }
    }

    pub fn observer(&self) -> &Observer<I> {
        &self.observer
    }

    pub fn observable(&self) -> &Observable<O> {
        &self.observable
    }

    pub fn activate_mode(&self) -> ActivationMode {
        if self.flags.auto_activate() {
            ActivationMode::Auto
        } else {
            ActivationMode::Manual
        }
    }

    pub fn deactivate_mode(&self) -> ActivationMode {
        if self.flags.auto_deactivate() {
            ActivationMode::Auto
        } else {
            ActivationMode::Manual
        }
    }

    /// Whether the pipe's observer is activated.
    pub fn activated(&self) -> bool {
        self.observer.activated()
    }

    /// `Auto` re-enables automatic activation; `Manual` activates now and
    /// disables automatic deactivation.
    pub fn activate(&self, mode: ActivationMode) -> Result<&Self> {
        match mode {
            ActivationMode::Auto => {
                self.flags.auto_activate.store(true, Ordering::SeqCst);
                if self.observable.observed() && !self.activated() {
                    self.observer.activate()?;
                }
            }
            ActivationMode::Manual => {
                self.flags.auto_deactivate.store(false, Ordering::SeqCst);
                self.observer.activate()?;
            }
        }
        Ok(self)
    }

    /// `Auto` re-enables automatic deactivation; `Manual` deactivates now and
    /// disables automatic activation.
    pub fn deactivate(&self, mode: ActivationMode) -> &Self {
        match mode {
            ActivationMode::Auto => {
                self.flags.auto_deactivate.store(true, Ordering::SeqCst);
                if !self.observable.observed() && self.activated() {
                    self.observer.deactivate();
                }
            }
            ActivationMode::Manual => {
                self.flags.auto_activate.store(false, Ordering::SeqCst);
                self.observer.deactivate();
            }
        }
        self
    }
}

impl<I, O> fmt::Debug for Pipe<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("observer", &self.observer)
            .field("observable", &self.observable)
            .field("auto_activate", &self.flags.auto_activate())
            .field("auto_deactivate", &self.flags.auto_deactivate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn doubling_pipe(config: PipeConfig) -> Pipe<i32, i32> {
        Pipe::with_config(config, || {
            let (observable, ctx) = Observable::with_context();
            let observer = Observer::new(move |v: &i32| ctx.emit(v * 2));
            PipeParts {
                observer,
                observable,
            }
        })
        .unwrap()
    }

    #[test]
    fn test_auto_activation_follows_observed_count() {
        let source = Observable::<i32>::new();
        let pipe = doubling_pipe(PipeConfig::default());
        source.pipe(&pipe).unwrap();
        assert!(!pipe.activated());
        assert!(!source.observed());

        let sink = Observer::new(|_: &i32| {});
        sink.observe(pipe.observable()).unwrap().activate().unwrap();
        assert!(pipe.activated());
        assert!(source.observed());

        sink.deactivate();
        assert!(!pipe.activated());
        assert!(!source.observed());
    }

    #[test]
    fn test_values_flow_through_chained_pipes() {
        let (source, ctx) = Observable::<i32>::with_context();
        let first = doubling_pipe(PipeConfig::default());
        let second = doubling_pipe(PipeConfig::default());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let output = source
            .pipe_through(&first)
            .unwrap()
            .pipe_through(&second)
            .unwrap();
        let sink = output
            .pipe_to(move |v: &i32| sink_seen.lock().push(*v))
            .unwrap();
        sink.activate().unwrap();

        assert!(first.activated());
        assert!(second.activated());

        ctx.emit(1);
        ctx.emit(5);
        assert_eq!(*seen.lock(), vec![4, 20]);

        sink.deactivate();
        assert!(!first.activated());
        assert!(!second.activated());
    }

    #[test]
    fn test_manual_activation_survives_unobserve() {
        let pipe = doubling_pipe(PipeConfig::default());
        pipe.activate(ActivationMode::Manual).unwrap();
        assert!(pipe.activated());
        assert_eq!(pipe.deactivate_mode(), ActivationMode::Manual);
        assert_eq!(pipe.activate_mode(), ActivationMode::Auto);

        let sink = Observer::new(|_: &i32| {});
        sink.observe(pipe.observable()).unwrap().activate().unwrap();
        sink.deactivate();
        assert!(pipe.activated());

        pipe.deactivate(ActivationMode::Auto);
        assert!(!pipe.activated());
        assert_eq!(pipe.deactivate_mode(), ActivationMode::Auto);
    }

    #[test]
    fn test_manual_deactivation_blocks_auto_activation() {
        let pipe = doubling_pipe(PipeConfig::default());
        pipe.deactivate(ActivationMode::Manual);
        assert_eq!(pipe.activate_mode(), ActivationMode::Manual);

        let sink = Observer::new(|_: &i32| {});
        sink.observe(pipe.observable()).unwrap().activate().unwrap();
        assert!(!pipe.activated());

        pipe.activate(ActivationMode::Auto).unwrap();
        assert!(pipe.activated());
    }

    #[test]
    fn test_config_disables_auto_activation() {
        let pipe = doubling_pipe(PipeConfig {
            auto_activate: false,
            auto_deactivate: true,
        });
        let sink = Observer::new(|_: &i32| {});
        sink.observe(pipe.observable()).unwrap().activate().unwrap();
        assert!(!pipe.activated());
    }

    #[test]
    fn test_observable_already_observed_activates_on_construction() {
        let (observable, ctx) = Observable::<i32>::with_context();
        let sink = Observer::new(|_: &i32| {});
        sink.observe(&observable).unwrap().activate().unwrap();

        let pipe = Pipe::new(move || PipeParts {
            observer: Observer::new(move |v: &i32| ctx.emit(*v)),
            observable,
        })
        .unwrap();
        assert!(pipe.activated());
    }

    struct RejectAll;

    impl ObserveHook<i32> for RejectAll {
        fn on_observe(&self, observable: &Observable<i32>, _: &Observer<i32>) -> Result<()> {
            Err(HeraldError::UniqClosed(observable.id().to_string()))
        }
    }

    #[test]
    fn test_failed_activation_leaves_observable_unclaimed() {
        let upstream = Observable::with_hook(RejectAll);
        let (observable, ctx) = Observable::<i32>::with_context();
        let sink = Observer::new(|_: &i32| {});
        sink.observe(&observable).unwrap().activate().unwrap();

        let observer = Observer::new(move |v: &i32| ctx.emit(*v));
        observer.observe(&upstream).unwrap();
        let parts = (observer.clone(), observable.clone());
        let result = Pipe::new(move || PipeParts {
            observer: parts.0,
            observable: parts.1,
        });
        assert!(matches!(result, Err(HeraldError::UniqClosed(_))));
        assert!(!observer.activated());

        // no pipe hook was left behind: relinking the sink does not touch the observer
        sink.deactivate();
        sink.activate().unwrap();
        assert!(!observer.activated());

        let retry = Pipe::new(move || PipeParts {
            observer: Observer::new(|_: &i32| {}),
            observable,
        });
        assert!(retry.is_ok());
    }

    #[test]
    fn test_observable_cannot_back_two_pipes() {
        let shared = Observable::<i32>::new();
        let first = shared.clone();
        Pipe::new(move || PipeParts {
            observer: Observer::new(|_: &i32| {}),
            observable: first,
        })
        .unwrap();

        let result = Pipe::new(move || PipeParts {
            observer: Observer::new(|_: &i32| {}),
            observable: shared,
        });
        assert!(matches!(result, Err(HeraldError::InvalidPipe(_))));
    }
}
