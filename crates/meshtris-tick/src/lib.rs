//! Fixed-timestep clock for the meshtris game loop.
//!
//! One [`TickClock`] drives one local game. Each tick the match driver
//! drains the mesh inbound queue, steps the local game, and lets the
//! match engine decide whether a board snapshot is due.
//!
//! The clock sits in a `tokio::select!` next to the other inputs:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = &mut quit => break,
//!         tick = clock.tick() => {
//!             step(tick.dt, tick.now);
//!             clock.finish_tick();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrunPolicy {
    /// Forget the missed ticks and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence. The next tick fires at its planned
    /// time, which may be immediately.
    Drop,
}

/// Clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second, `1..=MAX_RATE_HZ`.
    pub rate_hz: u32,

    pub policy: OverrunPolicy,

    /// Warn when a tick's work takes more than this fraction of the
    /// period (`0.0..=1.0`).
    pub budget_warn_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 60,
            policy: OverrunPolicy::Skip,
            budget_warn_threshold: 0.8,
        }
    }
}

impl TickConfig {
    pub const MAX_RATE_HZ: u32 = 240;

    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickClock::new`].
    pub fn validated(mut self) -> Self {
        let clamped = self.rate_hz.clamp(1, Self::MAX_RATE_HZ);
        if clamped != self.rate_hz {
            warn!(rate = self.rate_hz, clamped, "tick rate out of range");
            self.rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.rate_hz.max(1)))
    }
}

/// One fired tick.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Starts at 1.
    pub number: u64,
    /// Always one period. Game logic should step by this, not by wall
    /// time.
    pub dt: Duration,
    /// When the tick fired, on the runtime clock.
    pub now: Instant,
    /// Fired more than a tenth of a period late.
    pub late: bool,
    /// Whole periods missed before this tick (Skip policy only).
    pub missed: u64,
}

/// Counters over the clock's life.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockStats {
    pub ticks: u64,
    pub late_ticks: u64,
    pub missed_ticks: u64,
    /// Longest work time reported through [`TickClock::finish_tick`].
    pub max_work: Duration,
}

/// Fixed-timestep clock.
#[derive(Debug)]
pub struct TickClock {
    config: TickConfig,
    period: Duration,
    count: u64,
    next: TokioInstant,
    work_started: Option<Instant>,
    stats: ClockStats,
}

impl TickClock {
    /// The first tick fires one period from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();
        debug!(rate_hz = config.rate_hz, policy = ?config.policy, "tick clock created");
        Self {
            config,
            period,
            count: 0,
            next: TokioInstant::now() + period,
            work_started: None,
            stats: ClockStats::default(),
        }
    }

    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(rate_hz))
    }

    /// Waits for the next tick.
    pub async fn tick(&mut self) -> Tick {
        let due = self.next;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.count += 1;
        self.work_started = Some(Instant::now());

        let late_by = now.saturating_duration_since(due);
        let late = late_by > self.period / 10;
        let mut missed = 0;

        self.next = match self.config.policy {
            OverrunPolicy::Skip => {
                if late {
                    missed = (late_by.as_nanos() / self.period.as_nanos()) as u64;
                    if missed > 0 {
                        warn!(tick = self.count, missed, "tick overrun, skipping ahead");
                    }
                }
                now + self.period
            }
            OverrunPolicy::Drop => {
                if late {
                    warn!(
                        tick = self.count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping cadence"
                    );
                }
                due + self.period
            }
        };

        self.stats.ticks += 1;
        self.stats.missed_ticks += missed;
        if late {
            self.stats.late_ticks += 1;
        }
        trace!(tick = self.count, late, "tick");

        Tick {
            number: self.count,
            dt: self.period,
            now: now.into_std(),
            late,
            missed,
        }
    }

    /// Reports that the work for the current tick is done, for budget
    /// warnings. A no-op without a preceding [`TickClock::tick`].
    pub fn finish_tick(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let work = started.elapsed();
        self.stats.max_work = self.stats.max_work.max(work);

        let utilization = work.as_secs_f64() / self.period.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.count,
                work_ms = work.as_secs_f64() * 1000.0,
                budget_ms = self.period.as_secs_f64() * 1000.0,
                "tick work near or over budget"
            );
        }
    }

    /// Re-anchors the schedule so the next tick fires one period from now.
    pub fn reset(&mut self) {
        self.next = TokioInstant::now() + self.period;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn rate_hz(&self) -> u32 {
        self.config.rate_hz
    }

    pub fn stats(&self) -> ClockStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sixty_hz_skip() {
        let cfg = TickConfig::default();
        assert_eq!(cfg.rate_hz, 60);
        assert_eq!(cfg.policy, OverrunPolicy::Skip);
        assert_eq!(cfg.period(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_validated_clamps_rate() {
        assert_eq!(TickConfig::with_rate(0).validated().rate_hz, 1);
        assert_eq!(
            TickConfig::with_rate(10_000).validated().rate_hz,
            TickConfig::MAX_RATE_HZ
        );
        let cfg = TickConfig {
            budget_warn_threshold: 3.0,
            ..TickConfig::default()
        };
        assert_eq!(cfg.validated().budget_warn_threshold, 1.0);
    }
}
