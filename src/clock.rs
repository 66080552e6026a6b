use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The default length of one code window in seconds, per RFC 6238
pub const DEFAULT_STEP_SECS: u64 = 30;

/// Default remaining-seconds threshold below which a code counts as expiring
pub const DEFAULT_EXPIRY_THRESHOLD_SECS: u64 = 5;

/// Converts wall-clock time into code windows and countdown state.
///
/// The window counter drives code derivation and changes exactly once per
/// step; the countdown is a cosmetic signal for progress displays and may be
/// sampled as often as the UI likes without triggering recomputation. The
/// near-expiry threshold is a display convention, not part of the TOTP
/// standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpClock {
    step_secs: u64,
    expiry_threshold_secs: u64,
}

impl Default for TotpClock {
    fn default() -> Self {
        Self {
            step_secs: DEFAULT_STEP_SECS,
            expiry_threshold_secs: DEFAULT_EXPIRY_THRESHOLD_SECS,
        }
    }
}

/// Countdown state of one code window at a sampled instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    /// The window counter codes are derived from
    pub counter: u64,
    /// Whole seconds until the next window boundary, in `1..=step`
    pub seconds_remaining: u64,
    /// `seconds_remaining / step`, in `(0, 1]`
    pub progress: f64,
    /// Whether the code is about to expire
    pub expiring: bool,
}

impl TotpClock {
    /// A clock with the given step and the default expiry threshold.
    pub fn new(step_secs: u64) -> Self {
        Self {
            step_secs: if step_secs == 0 {
                DEFAULT_STEP_SECS
            } else {
                step_secs
            },
            ..Self::default()
        }
    }

    /// Replace the near-expiry threshold.
    pub fn with_expiry_threshold(mut self, secs: u64) -> Self {
        self.expiry_threshold_secs = secs;
        self
    }

    /// Length of one code window in seconds.
    pub fn step_secs(&self) -> u64 {
        self.step_secs
    }

    /// Remaining seconds below which [`Countdown::expiring`] is raised.
    pub fn expiry_threshold_secs(&self) -> u64 {
        self.expiry_threshold_secs
    }

    fn step(&self) -> u64 {
        self.step_secs.max(1)
    }

    fn unix_seconds(time: SystemTime) -> u64 {
        // SAFE: Wall-clock time is always after the UNIX epoch.
        #[allow(clippy::unwrap_used)]
        time.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs()
    }

    /// The window counter at `time`: `floor(unix_seconds / step)`.
    ///
    /// Monotonically non-decreasing with wall-clock time; every instant
    /// inside one window maps to the same counter and therefore the same
    /// code.
    pub fn counter_at(&self, time: SystemTime) -> u64 {
        Self::unix_seconds(time) / self.step()
    }

    /// The window counter right now.
    pub fn counter(&self) -> u64 {
        self.counter_at(SystemTime::now())
    }

    /// Sample the countdown state at `time`.
    pub fn countdown_at(&self, time: SystemTime) -> Countdown {
        let step = self.step();
        let unix = Self::unix_seconds(time);
        let seconds_remaining = step - unix % step;
        Countdown {
            counter: unix / step,
            seconds_remaining,
            progress: seconds_remaining as f64 / step as f64,
            expiring: seconds_remaining < self.expiry_threshold_secs,
        }
    }

    /// Sample the countdown state right now.
    pub fn countdown(&self) -> Countdown {
        self.countdown_at(SystemTime::now())
    }
}
