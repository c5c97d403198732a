//! ShutdownScheduler gating tests

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{Local, TimeZone};

use sentrycam::config::ShutdownConfig;
use sentrycam::shutdown::{SchedulerState, ShutdownScheduler, MIN_UPTIME};
use sentrycam::testing::CountingPower;

fn scheduler(hour: u32, minute: u32) -> ShutdownScheduler {
    ShutdownScheduler::new(&ShutdownConfig {
        enabled: true,
        hour,
        minute,
    })
}

fn at(hour: u32, minute: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
}

const LONG_UPTIME: Duration = Duration::from_secs(3600);

#[test]
fn test_unsynced_clock_never_fires() {
    // At/after shutdown time, plenty of uptime, but the clock is untrusted.
    let mut s = scheduler(20, 0);
    for minute in 0..30 {
        assert!(!s.check(at(20, minute), LONG_UPTIME, false));
    }
    assert_eq!(s.state(), SchedulerState::Armed);
}

#[test]
fn test_short_uptime_never_fires() {
    let mut s = scheduler(20, 0);
    assert!(!s.check(at(23, 0), Duration::from_secs(10), true));
    assert!(!s.check(at(23, 0), MIN_UPTIME, true));
    assert_eq!(s.state(), SchedulerState::Armed);
}

#[test]
fn test_conjunction_fires_exactly_once() {
    let mut s = scheduler(20, 30);
    assert!(!s.check(at(20, 29), LONG_UPTIME, true));
    assert!(s.check(at(20, 30), LONG_UPTIME, true));
    assert_eq!(s.state(), SchedulerState::Fired);

    // Conditions keep holding on later cycles; the action is never repeated.
    assert!(!s.check(at(20, 31), LONG_UPTIME, true));
    assert!(!s.check(at(23, 59), LONG_UPTIME, true));
}

#[test]
fn test_conditions_regaining_after_fire_do_not_rearm() {
    let mut s = scheduler(20, 0);
    assert!(s.check(at(20, 0), LONG_UPTIME, true));
    // Clock loses then regains sync; still terminal.
    assert!(!s.check(at(21, 0), LONG_UPTIME, false));
    assert!(!s.check(at(22, 0), LONG_UPTIME, true));
}

#[test]
fn test_disabled_config_is_inert() {
    let mut s = ShutdownScheduler::new(&ShutdownConfig {
        enabled: false,
        hour: 0,
        minute: 0,
    });
    assert!(!s.check(at(12, 0), LONG_UPTIME, true));
}

#[test]
fn test_counting_power_records_requests() {
    let power = CountingPower::new();
    let counter = power.counter();
    use sentrycam::shutdown::PowerOff;
    power.power_off().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
