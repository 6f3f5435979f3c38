//! Per-tool circuit breaker (spec.md §4.6). Same closed/open/half-open
//! shape as the teacher's `CircuitBreaker` in
//! `runtime/src/error_handler/mod.rs`, keyed by tool name instead of agent
//! id and using `Instant` rather than `SystemTime` since we only ever
//! compare durations within one process lifetime.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    /// One probe call is in flight; further calls are rejected until it
    /// resolves.
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    state: State,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            failure_count: 0,
            last_failure_at: None,
            state: State::Closed,
        }
    }

    /// `true` if a call may proceed right now. Transitions `Open ->
    /// HalfOpen` once the cooldown has elapsed, admitting exactly one
    /// probe; the probe's `record_success`/`record_failure` decides
    /// whether the breaker closes or reopens.
    pub fn allow_call(&mut self) -> bool {
        match self.state {
            State::Closed => true,
            State::HalfOpen => false,
            State::Open => {
                let elapsed = self.last_failure_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed > self.cooldown {
                    self.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = State::Closed;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_at = Some(Instant::now());
        if self.state == State::HalfOpen || self.failure_count >= self.failure_threshold {
            self.state = State::Open;
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_consecutive_failures() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(breaker.allow_call());
        breaker.record_failure();
        assert!(breaker.allow_call());
        breaker.record_failure();
        assert!(breaker.allow_call());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow_call());
    }

    #[test]
    fn success_resets_failure_count() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_open_probe_recloses_on_success() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(1));
        breaker.record_failure();
        assert!(breaker.is_open());
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_call()); // transitions to half-open, admits probe
        assert!(!breaker.allow_call()); // second caller rejected while probe is in flight
        breaker.record_success();
        assert!(!breaker.is_open());
        assert!(breaker.allow_call());
    }
}
