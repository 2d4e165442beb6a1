//! Integration tests for the clock actor.
//!
//! All tests run on paused Tokio time, so `sleep` advances the clock by
//! exactly the requested amount and charges are deterministic.

use std::time::Duration;

use duelhall_clock::{Clock, ClockConfig, ClockError, TimeControl};
use duelhall_protocol::Color;

// =========================================================================
// Helpers
// =========================================================================

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn clock_secs(allotted: u64) -> Clock {
    Clock::new(ClockConfig::symmetric(TimeControl::new(Duration::from_secs(
        allotted,
    ))))
}

// =========================================================================
// Charging
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_sixty_seconds_no_increment() {
    let mut clock = clock_secs(60);
    clock.start();
    // The game's first move is free.
    clock.flip().await.unwrap();

    tokio::time::sleep(ms(1200)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.remaining(Color::Black), ms(58_800));
    assert_eq!(state.remaining(Color::White), ms(60_000));

    tokio::time::sleep(ms(400)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.remaining(Color::White), ms(59_600));
    assert_eq!(state.remaining(Color::Black), ms(58_800));
}

#[tokio::test(start_paused = true)]
async fn test_first_flip_is_not_charged() {
    let mut clock = clock_secs(60);
    clock.start();
    tokio::time::sleep(ms(3000)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.remaining(Color::White), ms(60_000));
    assert_eq!(state.turn, Color::Black);
}

#[tokio::test(start_paused = true)]
async fn test_turn_alternates_on_every_flip() {
    let mut clock = clock_secs(60);
    clock.start();
    let mut expected = Color::Black;
    for _ in 0..6 {
        let state = clock.flip().await.unwrap();
        assert_eq!(state.turn, expected);
        expected = expected.opposite();
        tokio::time::sleep(ms(100)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_remaining_is_allotted_minus_sum_of_charges() {
    let mut clock = clock_secs(10);
    clock.start();
    clock.flip().await.unwrap();

    let charges = [ms(700), ms(300), ms(1500), ms(250), ms(900), ms(50)];
    let mut spent = [Duration::ZERO; 2];
    let mut mover = Color::Black;
    for charge in charges {
        tokio::time::sleep(charge).await;
        clock.flip().await.unwrap();
        spent[mover.index()] += charge;
        mover = mover.opposite();
    }
    let state = clock.state();
    for color in Color::BOTH {
        assert_eq!(
            state.remaining(color),
            Duration::from_secs(10).saturating_sub(spent[color.index()])
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_estimate_projects_side_to_move_only() {
    let mut clock = clock_secs(60);
    clock.start();
    clock.flip().await.unwrap();
    tokio::time::sleep(ms(2500)).await;
    assert_eq!(clock.estimate_remaining(Color::Black), ms(57_500));
    assert_eq!(clock.estimate_remaining(Color::White), ms(60_000));
}

#[tokio::test(start_paused = true)]
async fn test_increment_is_credited() {
    let mut clock = Clock::new(ClockConfig::symmetric(
        TimeControl::new(Duration::from_secs(60)).with_increment(ms(2000)),
    ));
    clock.start();
    clock.flip().await.unwrap();
    tokio::time::sleep(ms(5000)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.remaining(Color::Black), ms(57_000));
}

#[tokio::test(start_paused = true)]
async fn test_delay_window_is_free() {
    let mut clock = Clock::new(ClockConfig::symmetric(
        TimeControl::new(Duration::from_secs(60)).with_delay(ms(2000)),
    ));
    clock.start();
    clock.flip().await.unwrap();
    tokio::time::sleep(ms(1500)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.remaining(Color::Black), ms(60_000));
}

// =========================================================================
// Flag
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_flag_timer_publishes_timeout() {
    let mut clock = clock_secs(5);
    let mut updates = clock.take_updates().expect("fresh clock has updates");
    clock.start();
    clock.flip().await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(10), updates.recv())
        .await
        .expect("flag should fall within budget")
        .expect("update");
    assert_eq!(state.flagged, Some(Color::Black));
    assert_eq!(state.remaining(Color::Black), Duration::ZERO);
    assert!(!state.running);
}

#[tokio::test(start_paused = true)]
async fn test_flag_while_waiting_closes_the_clock() {
    let mut clock = clock_secs(1);
    clock.start();
    clock.flip().await.unwrap();

    tokio::time::sleep(ms(1500)).await;
    let state = clock.state();
    assert_eq!(state.flagged, Some(Color::Black));
    assert_eq!(state.remaining(Color::Black), Duration::ZERO);
    assert!(matches!(clock.flip().await, Err(ClockError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_the_flag() {
    let mut clock = clock_secs(2);
    let mut updates = clock.take_updates().unwrap();
    clock.start();
    clock.flip().await.unwrap();
    clock.pause().await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(30), updates.recv()).await;
    assert!(waited.is_err(), "paused clock must not flag");

    let state = clock.resume().await.unwrap();
    assert!(state.running);
    assert_eq!(state.remaining(Color::Black), ms(2000));
}

// =========================================================================
// Stop / Reset
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_publishes_final_state_and_closes() {
    let mut clock = clock_secs(60);
    let mut updates = clock.take_updates().unwrap();
    clock.start();
    clock.flip().await.unwrap();
    tokio::time::sleep(ms(1000)).await;

    let final_state = clock.stop(true).await;
    assert_eq!(final_state.remaining(Color::Black), ms(59_000));
    assert!(!final_state.running);

    assert_eq!(updates.recv().await, Some(final_state));
    assert_eq!(updates.recv().await, None, "channel closes after stop");
    assert!(matches!(clock.flip().await, Err(ClockError::Closed)));
    assert!(clock.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_publish_sends_nothing() {
    let mut clock = clock_secs(60);
    let mut updates = clock.take_updates().unwrap();
    clock.start();
    clock.stop(false).await;
    assert_eq!(updates.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_flip_before_start_is_closed() {
    let clock = clock_secs(60);
    assert!(matches!(clock.flip().await, Err(ClockError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_elapsed_and_reallocates_channels() {
    let mut clock = clock_secs(60);
    let mut old_updates = clock.take_updates().unwrap();
    clock.start();
    clock.flip().await.unwrap();
    tokio::time::sleep(ms(4000)).await;
    clock.flip().await.unwrap();

    clock.reset();
    assert!(!clock.is_started());
    assert_eq!(old_updates.recv().await, None);
    assert!(clock.take_updates().is_some());

    let state = clock.state();
    assert_eq!(state.remaining(Color::Black), ms(60_000));
    assert_eq!(state.turn, Color::White);

    clock.start();
    let state = clock.flip().await.unwrap();
    assert_eq!(state.turn, Color::Black);
}

// =========================================================================
// Limits
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_untimed_game_never_overflows() {
    let config = ClockConfig::symmetric(
        TimeControl::new(Duration::MAX).with_increment(Duration::from_secs(5)),
    );
    assert!(config.validate().is_ok());
    let mut clock = Clock::new(config);
    clock.start();

    clock.flip().await.unwrap();
    tokio::time::sleep(ms(1500)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.flagged, None);
    assert_eq!(state.remaining(Color::Black), Duration::MAX - ms(1500));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    let state = clock.flip().await.unwrap();
    assert_eq!(state.flagged, None);
    assert!(state.running);
}

#[test]
fn test_unanswered_flip_is_unresponsive() {
    // The loop lives on a runtime nobody drives after `start`, so the
    // command is queued but never acknowledged.
    let stalled = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let driver = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut config = ClockConfig::symmetric(TimeControl::new(Duration::from_secs(60)));
    config.ack_timeout = ms(50);
    let mut clock = Clock::new(config);
    stalled.block_on(async { clock.start() });
    assert!(clock.is_started());

    let result = driver.block_on(clock.flip());
    assert!(matches!(result, Err(ClockError::Unresponsive(guard)) if guard == ms(50)));
}
