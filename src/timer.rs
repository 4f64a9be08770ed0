//! One-shot countdown timer for the current question
//!
//! The countdown is a logical clock: the presentation layer schedules a
//! tick roughly every second and feeds it back into the core. Each arm
//! increments a generation counter and every scheduled tick carries the
//! generation it was armed under; a tick whose generation no longer
//! matches is stale and ignored. Arming therefore supersedes any
//! outstanding timeline without an explicit cancel call.

use serde::{Deserialize, Serialize};

/// The token a scheduled tick carries back into the core
///
/// Produced by [`Countdown::arm`] and consumed by [`Countdown::tick`];
/// the generation inside it decides whether the tick is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickAlarm {
    /// The timeline this tick belongs to
    generation: u64,
}

/// Outcome of feeding one tick into the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The tick belonged to a superseded timeline and was ignored
    Stale,
    /// The countdown is still running with this many seconds left
    Running(u64),
    /// The countdown just reached zero
    Expired,
}

/// A single-use ticking clock counting whole seconds down to zero
///
/// Only one timeline is ever live; re-arming invalidates all ticks
/// scheduled under the previous arm. Remaining time never goes
/// negative and expiry fires exactly once per arm.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Countdown {
    /// Seconds left on the live timeline
    remaining: u64,
    /// Current timeline; bumped on every arm and disarm
    generation: u64,
    /// Whether a timeline is live
    running: bool,
    /// Whether the live-most timeline ran out
    expired: bool,
}

impl Countdown {
    /// Arms the countdown to a full duration and starts a new timeline
    ///
    /// Any ticks scheduled under a previous arm become stale.
    ///
    /// # Returns
    ///
    /// The [`TickAlarm`] the caller schedules for the first tick.
    pub fn arm(&mut self, seconds: u64) -> TickAlarm {
        self.generation += 1;
        self.remaining = seconds;
        self.running = true;
        self.expired = false;
        TickAlarm {
            generation: self.generation,
        }
    }

    /// Stops the live timeline without firing expiry
    ///
    /// Used when the question is navigated away from or the answer is
    /// revealed early; outstanding ticks become stale.
    pub fn disarm(&mut self) {
        self.generation += 1;
        self.running = false;
        self.expired = false;
    }

    /// Feeds one scheduled tick into the countdown
    ///
    /// # Returns
    ///
    /// [`Tick::Stale`] for ticks of a superseded timeline,
    /// [`Tick::Running`] with the remaining seconds while time is left,
    /// and [`Tick::Expired`] exactly once when the countdown hits zero.
    pub fn tick(&mut self, alarm: TickAlarm) -> Tick {
        if !self.running || alarm.generation != self.generation {
            return Tick::Stale;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    /// Seconds left on the live timeline (zero once expired or disarmed)
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Whether the current timeline ran out
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Whether a timeline is live and ticking
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_countdown_expires_exactly_once() {
        let mut countdown = Countdown::default();
        let alarm = countdown.arm(60);

        let mut expirations = 0;
        for _ in 0..60 {
            match countdown.tick(alarm) {
                Tick::Expired => expirations += 1,
                Tick::Running(remaining) => assert!(remaining < 60),
                Tick::Stale => panic!("live tick reported stale"),
            }
        }

        assert_eq!(expirations, 1);
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.is_expired());

        // Extra ticks after expiry are ignored and never go negative.
        assert_eq!(countdown.tick(alarm), Tick::Stale);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn test_rearm_resets_to_full_duration() {
        let mut countdown = Countdown::default();
        let first = countdown.arm(10);
        countdown.tick(first);
        countdown.tick(first);
        assert_eq!(countdown.remaining(), 8);

        let second = countdown.arm(10);
        assert_eq!(countdown.remaining(), 10);

        // A tick scheduled under the first arm must not decrement the
        // new timeline.
        assert_eq!(countdown.tick(first), Tick::Stale);
        assert_eq!(countdown.remaining(), 10);

        assert_eq!(countdown.tick(second), Tick::Running(9));
    }

    #[test]
    fn test_disarm_silences_outstanding_ticks() {
        let mut countdown = Countdown::default();
        let alarm = countdown.arm(5);
        countdown.tick(alarm);
        countdown.disarm();

        assert!(!countdown.is_running());
        assert!(!countdown.is_expired());
        assert_eq!(countdown.tick(alarm), Tick::Stale);
    }

    #[test]
    fn test_rearm_clears_expired_flag() {
        let mut countdown = Countdown::default();
        let alarm = countdown.arm(1);
        assert_eq!(countdown.tick(alarm), Tick::Expired);
        assert!(countdown.is_expired());

        countdown.arm(5);
        assert!(!countdown.is_expired());
        assert!(countdown.is_running());
    }
}
