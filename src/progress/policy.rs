use std::time::Duration;
use tokio::time::Instant;

use crate::config::SyncConfig;

/// Which rule produced a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// The track reached its end margin; status becomes listened.
    Completed,
    /// The position jumped between ticks (a seek).
    Delta,
    /// Nothing else fired for long enough; progress-only fallback.
    Heartbeat,
}

/// Flush-rule bookkeeping for the track currently playing. Clock-explicit:
/// callers pass `now`, nothing in here reads a clock, so the rules can be
/// evaluated against synthetic timelines.
#[derive(Debug)]
pub struct FlushPolicy {
    end_margin: Duration,
    delta_threshold: Duration,
    delta_cooldown: Duration,
    heartbeat: Duration,
    last_flush_at: Instant,
    last_delta_at: Option<Instant>,
    last_observed: Duration,
    completed: bool,
}

impl FlushPolicy {
    pub fn new(config: &SyncConfig, position: Duration, now: Instant) -> Self {
        Self {
            end_margin: config.end_margin(),
            delta_threshold: config.delta_threshold(),
            delta_cooldown: config.delta_cooldown(),
            heartbeat: config.heartbeat(),
            last_flush_at: now,
            last_delta_at: None,
            last_observed: position,
            completed: false,
        }
    }

    /// Reset all bookkeeping for a new track starting at `position`.
    pub fn rearm(&mut self, position: Duration, now: Instant) {
        self.last_flush_at = now;
        self.last_delta_at = None;
        self.last_observed = position;
        self.completed = false;
    }

    /// Evaluate the rules for one monitor tick. At most one rule fires:
    /// completion wins over a seek jump, which wins over the heartbeat.
    pub fn on_tick(
        &mut self,
        position: Duration,
        duration: Option<Duration>,
        now: Instant,
    ) -> Option<FlushKind> {
        let jumped = abs_diff(position, self.last_observed) >= self.delta_threshold;
        self.last_observed = position;

        if !self.completed
            && let Some(duration) = duration
            && duration > Duration::ZERO
            && position + self.end_margin >= duration
        {
            return Some(FlushKind::Completed);
        }

        if jumped
            && self
                .last_delta_at
                .is_none_or(|at| now.duration_since(at) >= self.delta_cooldown)
        {
            return Some(FlushKind::Delta);
        }

        if now.duration_since(self.last_flush_at) >= self.heartbeat {
            return Some(FlushKind::Heartbeat);
        }

        None
    }

    /// Record that a flush went out, restarting the heartbeat clock (and
    /// the delta cooldown or completion latch where applicable).
    pub fn record(&mut self, kind: FlushKind, now: Instant) {
        self.last_flush_at = now;
        match kind {
            FlushKind::Completed => self.completed = true,
            FlushKind::Delta => self.last_delta_at = Some(now),
            FlushKind::Heartbeat => {}
        }
    }
}

fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a >= b { a - b } else { b - a }
}
