//! Condition-gated unattended power-off
//!
//! Powering off is irreversible, so the scheduler fires only on the full
//! conjunction: feature enabled, wall-clock past the configured time of day,
//! enough uptime to rule out a boot loop, and a clock the OS actually trusts.
//! The Fired state is terminal for the process lifetime.

use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, Timelike};

use crate::config::ShutdownConfig;
use crate::errors::AgentError;

/// Minimum uptime before an automatic shutdown is allowed.
pub const MIN_UPTIME: Duration = Duration::from_secs(300);

/// Whether the OS considers its clock synchronized.
pub trait ClockSync {
    fn synced(&self) -> bool;
}

/// Queries the system time-sync service.
pub struct TimedatectlClock;

impl ClockSync for TimedatectlClock {
    fn synced(&self) -> bool {
        let output = match Command::new("timedatectl").output() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("timedatectl unavailable, treating clock as unsynced: {}", e);
                return false;
            }
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|line| line.trim() == "System clock synchronized: yes")
    }
}

/// Irreversible power-off request.
pub trait PowerOff {
    fn power_off(&self) -> Result<(), AgentError>;
}

/// Issues the OS shutdown command.
pub struct SystemPower;

impl PowerOff for SystemPower {
    fn power_off(&self) -> Result<(), AgentError> {
        let status = Command::new("sudo")
            .args(["shutdown", "-h", "now"])
            .status()
            .map_err(|e| AgentError::io(e, "issue shutdown command"))?;
        if !status.success() {
            return Err(AgentError::IoError(format!(
                "shutdown command exited with {}",
                status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Armed,
    Fired,
}

pub struct ShutdownScheduler {
    enabled: bool,
    fire_at: NaiveTime,
    state: SchedulerState,
}

impl ShutdownScheduler {
    pub fn new(config: &ShutdownConfig) -> Self {
        let fire_at = NaiveTime::from_hms_opt(config.hour, config.minute, 0)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        Self {
            enabled: config.enabled,
            fire_at,
            state: SchedulerState::Armed,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Evaluate the gate and transition to Fired when every condition holds.
    /// Returns true exactly once per process lifetime.
    pub fn check(&mut self, now: DateTime<Local>, uptime: Duration, synced: bool) -> bool {
        if self.state == SchedulerState::Fired || !self.enabled {
            return false;
        }
        if now.time() < self.fire_at {
            return false;
        }
        if uptime <= MIN_UPTIME {
            log::debug!(
                "shutdown window open but uptime {}s under guard",
                uptime.as_secs()
            );
            return false;
        }
        if !synced {
            // An untrusted clock must not trigger an irreversible action.
            log::info!("shutdown window open but clock not synchronized, holding");
            return false;
        }

        self.state = SchedulerState::Fired;
        log::info!(
            "shutdown scheduled for {:02}:{:02} firing at {}",
            self.fire_at.hour(),
            self.fire_at.minute(),
            now.format("%H:%M:%S")
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler(enabled: bool) -> ShutdownScheduler {
        ShutdownScheduler::new(&ShutdownConfig {
            enabled,
            hour: 20,
            minute: 0,
        })
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 9, hour, minute, 0).unwrap()
    }

    const PAST_GUARD: Duration = Duration::from_secs(301);

    #[test]
    fn test_fires_only_on_full_conjunction() {
        let mut s = scheduler(true);
        assert!(!s.check(at(19, 59), PAST_GUARD, true));
        assert!(!s.check(at(20, 0), Duration::from_secs(299), true));
        assert!(!s.check(at(20, 0), PAST_GUARD, false));
        assert!(s.check(at(20, 0), PAST_GUARD, true));
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut s = scheduler(false);
        assert!(!s.check(at(23, 0), PAST_GUARD, true));
        assert_eq!(s.state(), SchedulerState::Armed);
    }

    #[test]
    fn test_fired_is_terminal() {
        let mut s = scheduler(true);
        assert!(s.check(at(20, 30), PAST_GUARD, true));
        assert_eq!(s.state(), SchedulerState::Fired);
        assert!(!s.check(at(20, 31), PAST_GUARD, true));
    }

    #[test]
    fn test_uptime_guard_is_strict() {
        let mut s = scheduler(true);
        assert!(!s.check(at(20, 0), Duration::from_secs(300), true));
        assert!(s.check(at(20, 0), Duration::from_secs(301), true));
    }
}
