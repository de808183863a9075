//! Request timing.
//!
//! A [`Timer`] hands out one [`TimerHandle`] per request. The handle travels
//! with the request (in its extensions) from the start hook to the terminal
//! hook; it is never stored on the middleware itself.

use std::time::{Duration, Instant};

/// Factory for per-request timer handles.
pub trait Timer: Send + Sync + 'static {
    type Handle: TimerHandle;

    fn start(&self) -> Self::Handle;
}

/// A running or stopped measurement.
///
/// `Clone` because request extensions require it; a clone is an independent
/// measurement with the same start instant.
pub trait TimerHandle: Clone + Send + Sync + 'static {
    /// Freezes the measurement.
    ///
    /// # Panics
    ///
    /// Panics if the handle was already stopped.
    fn stop(&mut self);

    /// Milliseconds from start to stop, or to now while still running.
    fn elapsed_milliseconds(&self) -> f64;
}

/// The default [`Timer`], backed by the monotonic [`Instant`] clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicTimer;

impl Timer for MonotonicTimer {
    type Handle = Stopwatch;

    fn start(&self) -> Stopwatch {
        Stopwatch::start()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    started: Instant,
    stopped: Option<Instant>,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { started: Instant::now(), stopped: None }
    }

    pub fn is_running(&self) -> bool {
        self.stopped.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        // Instant is monotonic, so this never underflows.
        self.stopped.unwrap_or_else(Instant::now).duration_since(self.started)
    }
}

impl TimerHandle for Stopwatch {
    fn stop(&mut self) {
        assert!(self.is_running(), "stopwatch stopped twice");
        self.stopped = Some(Instant::now());
    }

    fn elapsed_milliseconds(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}
