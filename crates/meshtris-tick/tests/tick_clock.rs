//! Integration tests for the tick clock.
//!
//! Runs on a paused Tokio clock so every sleep resolves as soon as time
//! is advanced.

use std::time::Duration;

use meshtris_tick::{OverrunPolicy, TickClock, TickConfig};

fn clock_20hz(policy: OverrunPolicy) -> TickClock {
    TickClock::new(TickConfig {
        policy,
        ..TickConfig::with_rate(20)
    })
}

#[test]
fn test_clock_initial_state() {
    let clock = TickClock::with_rate(20);
    assert_eq!(clock.count(), 0);
    assert_eq!(clock.rate_hz(), 20);
    assert_eq!(clock.period(), Duration::from_millis(50));
    assert_eq!(clock.stats().ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_numbered_with_fixed_dt() {
    let mut clock = clock_20hz(OverrunPolicy::Skip);
    for expected in 1..=5 {
        let tick = clock.tick().await;
        assert_eq!(tick.number, expected);
        assert_eq!(tick.dt, Duration::from_millis(50));
        assert!(!tick.late);
        clock.finish_tick();
    }
    assert_eq!(clock.stats().ticks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_tick_now_follows_runtime_clock() {
    let mut clock = clock_20hz(OverrunPolicy::Skip);
    let first = clock.tick().await;
    let second = clock.tick().await;
    assert_eq!(second.now - first.now, Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_missed_ticks() {
    let mut clock = clock_20hz(OverrunPolicy::Skip);
    clock.tick().await;

    // Stall for four periods before asking for the next tick.
    tokio::time::advance(Duration::from_millis(220)).await;
    let tick = clock.tick().await;
    assert!(tick.late);
    assert_eq!(tick.missed, 3);

    // The schedule restarts from now: the following tick is on time.
    let next = clock.tick().await;
    assert!(!next.late);
    assert_eq!(clock.stats().missed_ticks, 3);
    assert_eq!(clock.stats().late_ticks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_cadence() {
    let mut clock = clock_20hz(OverrunPolicy::Drop);
    clock.tick().await;

    tokio::time::advance(Duration::from_millis(220)).await;
    let tick = clock.tick().await;
    assert!(tick.late);
    assert_eq!(tick.missed, 0);

    // The next deadline was planned from the missed one, so it is
    // already overdue.
    let next = clock.tick().await;
    assert!(next.late);
}

#[tokio::test(start_paused = true)]
async fn test_finish_without_tick_is_noop() {
    let mut clock = clock_20hz(OverrunPolicy::Skip);
    clock.finish_tick();
    assert_eq!(clock.stats().max_work, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_reset_reanchors_schedule() {
    let mut clock = clock_20hz(OverrunPolicy::Drop);
    tokio::time::advance(Duration::from_millis(500)).await;
    clock.reset();
    let tick = clock.tick().await;
    assert!(!tick.late);
}

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_command() {
    let mut clock = clock_20hz(OverrunPolicy::Skip);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("quit").await.ok();
    });

    let mut fired = 0;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "quit");
                break;
            }
            tick = clock.tick() => {
                fired += 1;
                assert_eq!(tick.number, fired);
                clock.finish_tick();
            }
        }
    }
    assert!(fired >= 3, "expected at least 3 ticks, got {fired}");
}
