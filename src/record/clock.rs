use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Shared cancellation flag. Cancelling stands for the host being unmounted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source of animation ticks.
pub trait FrameClock: Send {
    /// Current time in milliseconds on this clock's timeline.
    fn now_ms(&self) -> f64;

    /// Wait for the next tick and return its timestamp, or `None` once cancelled.
    fn next_tick(&mut self) -> Option<f64>;
}

/// Deterministic clock ticking at a fixed rate without sleeping.
#[derive(Clone, Debug)]
pub struct FixedStepClock {
    step_ms: f64,
    ticks: u64,
    max_ticks: Option<u64>,
    cancel: Option<CancelToken>,
}

impl FixedStepClock {
    /// Clock ticking `hz` times per simulated second.
    pub fn new(hz: f64) -> Self {
        Self::with_step_ms(1000.0 / hz)
    }

    pub fn with_step_ms(step_ms: f64) -> Self {
        Self {
            step_ms,
            ticks: 0,
            max_ticks: None,
            cancel: None,
        }
    }

    /// Stop ticking (as if cancelled) after `n` ticks.
    pub fn limit(mut self, n: u64) -> Self {
        self.max_ticks = Some(n);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl FrameClock for FixedStepClock {
    fn now_ms(&self) -> f64 {
        // Multiplying avoids drift from repeated addition.
        self.ticks as f64 * self.step_ms
    }

    fn next_tick(&mut self) -> Option<f64> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return None;
        }
        if self.max_ticks.is_some_and(|m| self.ticks >= m) {
            return None;
        }
        self.ticks += 1;
        Some(self.now_ms())
    }
}

/// Wall-clock ticks at a display-like rate, sleeping between them.
#[derive(Clone, Debug)]
pub struct RealtimeClock {
    origin: Instant,
    step: Duration,
    next: Instant,
    cancel: CancelToken,
}

impl RealtimeClock {
    pub fn new(hz: f64, cancel: CancelToken) -> Self {
        let origin = Instant::now();
        let step = Duration::from_secs_f64(1.0 / hz.max(1.0));
        Self {
            origin,
            step,
            next: origin + step,
            cancel,
        }
    }
}

impl FrameClock for RealtimeClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn next_tick(&mut self) -> Option<f64> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }
        // Skip missed ticks instead of bursting to catch up.
        let now = Instant::now();
        while self.next <= now {
            self.next += self.step;
        }
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(self.now_ms())
    }
}
