//! Fixed-rate game loop cadence for duelnet.
//!
//! A [`TickScheduler`] hands out ticks at a steady rate (60 Hz by default)
//! measured on the Tokio monotonic clock. When the loop falls behind it
//! skips ahead instead of bursting, so a slow frame never snowballs into a
//! backlog of simulation steps.
//!
//! The scheduler is meant to be one branch of the driver's `select!`:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* restart, shutdown */ }
//!         tick = scheduler.wait_for_tick() => {
//!             reconciler.step(tick.dt, input);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! While paused (after game over, for example) `wait_for_tick` never
//! resolves, which leaves the other `select!` branches in charge.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Drop the missed ticks and schedule the next one a full period from
    /// now. Never accumulates debt.
    #[default]
    Skip,
    /// Keep the original cadence: the next deadline is the missed deadline
    /// plus one period, even if that is already in the past.
    KeepCadence,
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick period (0.0–1.0) the per-tick work may use
    /// before a warning is logged.
    pub budget_warn_threshold: f64,
    /// Upper bound, in microseconds, of random delay added to the first
    /// tick so two peers started together don't step in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            policy: TickPolicy::Skip,
            budget_warn_threshold: 0.8,
            initial_jitter_us: 1_000,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 240;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                requested = self.tick_rate_hz,
                used = clamped,
                "tick rate out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

/// One fired tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Counts up from 1. Keeps counting across pause/resume.
    pub number: u64,
    /// Fixed step for the simulation; always one period.
    pub dt: Duration,
    /// Whole periods dropped because this tick fired late.
    pub skipped: u64,
}

/// Fixed-rate tick source for a single game loop.
pub struct TickScheduler {
    config: TickConfig,
    period: Duration,
    ticks: u64,
    skipped_total: u64,
    deadline: Instant,
    started: Option<Instant>,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            period_ms = period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            period,
            ticks: 0,
            skipped_total: 0,
            deadline: Instant::now() + period + jitter,
            started: None,
            paused: false,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits for the next tick.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// deadline untouched. Pends forever while paused.
    pub async fn wait_for_tick(&mut self) -> Tick {
        if self.paused {
            std::future::pending::<()>().await;
        }

        time::sleep_until(self.deadline).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.deadline);
        let skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;

        self.deadline = match self.config.policy {
            TickPolicy::Skip => now + self.period,
            TickPolicy::KeepCadence => self.deadline + self.period,
        };
        if skipped > 0 {
            warn!(
                tick = self.ticks + 1,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick loop fell behind"
            );
        }

        self.ticks += 1;
        self.skipped_total += skipped;
        self.started = Some(now);
        trace!(tick = self.ticks, "tick");

        Tick {
            number: self.ticks,
            dt: self.period,
            skipped,
        }
    }

    /// Marks the end of the work for the current tick and warns if it ate
    /// too much of the period. A no-op without a preceding tick.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.started.take() else {
            return;
        };
        let used = started.elapsed().as_secs_f64() / self.period.as_secs_f64();
        if used >= self.config.budget_warn_threshold {
            warn!(
                tick = self.ticks,
                used_pct = format!("{:.1}", used * 100.0),
                "tick work close to or over budget"
            );
        }
    }

    /// Stops ticking. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.ticks, "tick scheduler paused");
        }
    }

    /// Restarts ticking one full period from now; time spent paused is
    /// not made up.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.deadline = Instant::now() + self.period;
            debug!(tick = self.ticks, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Total ticks dropped by overruns so far.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
