//! Integration tests for the tick scheduler.
//!
//! Time-dependent tests run with `start_paused = true`, so `sleep_until`
//! resolves as soon as every task is idle and `advance` moves the clock by
//! exactly the amount asked.

use std::time::Duration;

use duelnet_tick::{TickConfig, TickPolicy, TickScheduler};

fn no_jitter(rate: u32) -> TickConfig {
    TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(rate)
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_sixty_hz_skip() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 60);
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.period(), Duration::from_secs_f64(1.0 / 60.0));
}

#[test]
fn test_validated_clamps_rate() {
    assert_eq!(TickConfig::with_rate(0).validated().tick_rate_hz, 1);
    assert_eq!(
        TickConfig::with_rate(10_000).validated().tick_rate_hz,
        TickConfig::MAX_TICK_RATE_HZ
    );
}

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::with_rate(20);
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert_eq!(s.period(), Duration::from_millis(50));
    assert!(!s.is_paused());
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_count_up_with_fixed_dt() {
    let mut s = TickScheduler::new(no_jitter(20));

    for expected in 1..=5 {
        let tick = s.wait_for_tick().await;
        assert_eq!(tick.number, expected);
        assert_eq!(tick.dt, Duration::from_millis(50));
        assert_eq!(tick.skipped, 0);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_waits_one_period() {
    let mut s = TickScheduler::new(no_jitter(20));
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

// =========================================================================
// Overrun handling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_drops_missed_ticks() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.wait_for_tick().await;

    // Simulate a stall of 3.5 periods.
    tokio::time::advance(Duration::from_millis(175)).await;

    let late = s.wait_for_tick().await;
    assert_eq!(late.number, 2);
    assert_eq!(late.skipped, 2);
    assert_eq!(s.skipped_total(), 2);

    // Next tick is a full period after the late one, not a burst.
    let before = tokio::time::Instant::now();
    let next = s.wait_for_tick().await;
    assert_eq!(next.skipped, 0);
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_keep_cadence_fires_immediately_after_stall() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::KeepCadence,
        ..no_jitter(20)
    });
    s.wait_for_tick().await;
    tokio::time::advance(Duration::from_millis(175)).await;
    s.wait_for_tick().await;

    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

// =========================================================================
// Pause / resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_paused_scheduler_never_fires() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.wait_for_tick().await;
    s.pause();

    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err(), "paused scheduler should pend");
    assert_eq!(s.tick_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_restarts_one_period_later() {
    let mut s = TickScheduler::new(no_jitter(20));
    s.wait_for_tick().await;
    s.pause();
    tokio::time::advance(Duration::from_secs(3)).await;
    s.resume();

    let before = tokio::time::Instant::now();
    let tick = s.wait_for_tick().await;
    assert_eq!(tick.number, 2);
    assert_eq!(tick.skipped, 0, "time spent paused is not an overrun");
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[test]
fn test_pause_resume_idempotent() {
    let mut s = TickScheduler::with_rate(20);
    s.pause();
    s.pause();
    assert!(s.is_paused());
    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

#[test]
fn test_record_tick_end_without_tick_is_noop() {
    let mut s = TickScheduler::with_rate(20);
    s.record_tick_end();
    assert_eq!(s.tick_count(), 0);
}

// =========================================================================
// select! usage
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_command() {
    let mut s = TickScheduler::new(no_jitter(20));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            tick = s.wait_for_tick() => {
                fired += 1;
                assert_eq!(tick.number, fired);
                s.record_tick_end();
            }
        }
    }
    assert_eq!(fired, 3);
}
