use std::time::{Duration, Instant};

use crate::types::SpeedSetting;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Stopped,
    Running { next_due: Instant },
}

/// Outcome of polling the engine at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickDecision {
    /// Nothing due yet, or stopped.
    Idle,
    /// A tick is due; the caller must submit it and later call `complete`.
    Fire,
    /// A tick was due but the previous one is still in flight.
    Skipped,
}

/// Fixed-period tick scheduler with at most one tick in flight.
///
/// The engine holds no clock of its own; callers pass `now` so that
/// scheduling is deterministic.
#[derive(Debug)]
pub struct StepEngine {
    state: EngineState,
    speed: SpeedSetting,
    in_flight_since: Option<Instant>,
    skipped: u64,
}

impl StepEngine {
    pub fn new(speed: SpeedSetting) -> Self {
        Self {
            state: EngineState::Stopped,
            speed,
            in_flight_since: None,
            skipped: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running { .. })
    }

    pub fn speed(&self) -> SpeedSetting {
        self.speed
    }

    pub fn interval(&self) -> Duration {
        self.speed.interval()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn in_flight_since(&self) -> Option<Instant> {
        self.in_flight_since
    }

    /// Returns `false` if already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = EngineState::Running {
            next_due: now + self.interval(),
        };
        true
    }

    /// Cancels the pending deadline. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = EngineState::Stopped;
        true
    }

    /// Changes the period; a running engine is rescheduled from `now`.
    pub fn set_speed(&mut self, speed: SpeedSetting, now: Instant) {
        self.speed = speed;
        if let EngineState::Running { next_due } = &mut self.state {
            *next_due = now + speed.interval();
        }
    }

    pub fn poll(&mut self, now: Instant) -> TickDecision {
        let interval = self.interval();
        let EngineState::Running { next_due } = &mut self.state else {
            return TickDecision::Idle;
        };
        if now < *next_due {
            return TickDecision::Idle;
        }

        let mut following = *next_due + interval;
        if following <= now {
            following = now + interval;
        }
        *next_due = following;

        if self.in_flight_since.is_some() {
            self.skipped += 1;
            return TickDecision::Skipped;
        }
        self.in_flight_since = Some(now);
        TickDecision::Fire
    }

    /// Marks the in-flight tick as resolved, successfully or not.
    pub fn complete(&mut self) {
        self.in_flight_since = None;
    }

    /// Time left before the next deadline, if running.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        match self.state {
            EngineState::Running { next_due } => Some(next_due.saturating_duration_since(now)),
            EngineState::Stopped => None,
        }
    }
}
