//! Ready-made transformation stages.

use super::stage::Pipe;
use crate::config::PipeConfig;
use crate::core::{Observable, ObservableContext, Observer};

fn stage<I, O, F>(forward: F) -> Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&I, &ObservableContext<O>) + Send + Sync + 'static,
{
    let (observable, ctx) = Observable::with_context();
    let observer = Observer::new(move |value: &I| forward(value, &ctx));
    observable.claim_for_pipe();
    Pipe::assemble(PipeConfig::default(), observer, observable)
}

/// Emit `f(value)` for every value.
pub fn map<I, O, F>(f: F) -> Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&I) -> O + Send + Sync + 'static,
{
    stage(move |value, ctx| ctx.emit(f(value)))
}

/// Forward only the values matching `predicate`.
pub fn filter<T, F>(predicate: F) -> Pipe<T, T>
where
    T: Clone + Send + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    stage(move |value: &T, ctx| {
        if predicate(value) {
            ctx.emit(value.clone());
        }
    })
}

/// Run `f` on every value and forward it unchanged.
pub fn inspect<T, F>(f: F) -> Pipe<T, T>
where
    T: Clone + Send + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    stage(move |value: &T, ctx| {
        f(value);
        ctx.emit(value.clone());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_map_filter_chain() {
        let (source, ctx) = Observable::<i32>::with_context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);

        // stages are owned by the caller; links alone do not keep them alive
        let evens = filter(|v: &i32| v % 2 == 0);
        let labels = map(|v: &i32| format!("#{v}"));
        let sink = source
            .pipe_through(&evens)
            .unwrap()
            .pipe_through(&labels)
            .unwrap()
            .pipe_to(move |s: &String| sink_seen.lock().push(s.clone()))
            .unwrap();
        sink.activate().unwrap();

        for i in 1..=6 {
            ctx.emit(i);
        }
        assert_eq!(*seen.lock(), vec!["#2", "#4", "#6"]);
    }

    #[test]
    fn test_inspect_sees_values_without_changing_them() {
        let (source, ctx) = Observable::<u8>::with_context();
        let inspected = Arc::new(Mutex::new(Vec::new()));
        let forwarded = Arc::new(Mutex::new(Vec::new()));
        let (i, f) = (Arc::clone(&inspected), Arc::clone(&forwarded));

        let tap = inspect(move |v: &u8| i.lock().push(*v));
        let sink = source
            .pipe_through(&tap)
            .unwrap()
            .pipe_to(move |v: &u8| f.lock().push(*v))
            .unwrap();
        sink.activate().unwrap();

        ctx.emit(9);
        assert_eq!(*inspected.lock(), vec![9]);
        assert_eq!(*forwarded.lock(), vec![9]);

        sink.deactivate();
        assert!(!tap.activated());
    }
}
