// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fractional progress reporting.

use std::sync::{Arc, Mutex};

/// Receives fractional progress updates in `0.0..=1.0`.
///
/// Implementations are called from the thread performing the work and
/// must hand updates off to whatever thread observes them.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}

/// A sink discarding all updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64) {}
}

/// Adapts a closure into a [ProgressSink].
pub struct ProgressFn<F>(pub F);

impl<F> ProgressSink for ProgressFn<F>
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, fraction: f64) {
        (self.0)(fraction)
    }
}

/// Forwards clamped, non-decreasing progress to any number of sinks.
///
/// Values are clamped to `0.0..=1.0`. Updates not greater than the last
/// forwarded value are dropped, as are NaNs.
#[derive(Default)]
pub struct MonotonicProgress {
    sinks: Vec<Arc<dyn ProgressSink>>,
    last: Mutex<Option<f64>>,
}

impl MonotonicProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional sink.
    pub fn add_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    /// The last forwarded value.
    pub fn last(&self) -> Option<f64> {
        self.last.lock().map(|last| *last).unwrap_or(None)
    }
}

impl ProgressSink for MonotonicProgress {
    fn report(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }

        let fraction = fraction.clamp(0.0, 1.0);

        {
            let mut last = match self.last.lock() {
                Ok(last) => last,
                Err(poisoned) => poisoned.into_inner(),
            };

            if matches!(*last, Some(previous) if fraction <= previous) {
                return;
            }

            *last = Some(fraction);
        }

        for sink in &self.sinks {
            sink.report(fraction);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<f64>>);

    impl ProgressSink for Recorder {
        fn report(&self, fraction: f64) {
            self.0.lock().unwrap().push(fraction);
        }
    }

    #[test]
    fn clamps_and_drops_regressions() {
        let recorder = Arc::new(Recorder::default());
        let mut progress = MonotonicProgress::new();
        progress.add_sink(recorder.clone());

        for value in [-0.5, 0.0, 0.25, 0.2, 0.25, f64::NAN, 0.5, 1.5, 1.0] {
            progress.report(value);
        }

        assert_eq!(*recorder.0.lock().unwrap(), vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(progress.last(), Some(1.0));
    }

    #[test]
    fn fans_out() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let mut progress = MonotonicProgress::new();
        progress.add_sink(a.clone());
        progress.add_sink(b.clone());

        progress.report(0.5);

        assert_eq!(*a.0.lock().unwrap(), vec![0.5]);
        assert_eq!(*b.0.lock().unwrap(), vec![0.5]);
    }

    #[test]
    fn closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::<f64>::new()));
        let captured = seen.clone();
        let sink = ProgressFn(move |fraction: f64| captured.lock().unwrap().push(fraction));

        sink.report(0.75);
        NoProgress.report(0.5);

        assert_eq!(*seen.lock().unwrap(), vec![0.75]);
    }
}
