use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Shortest interval length. Zero-length annotations are bumped by this much.
pub const EPSILON: f64 = 0.001;

/// Window in which a stop time counts as "still open", and the largest
/// cursor step that is not considered a seek.
pub const PROXIMITY: f64 = 0.5;

/// Largest magnitude accepted for a recorded timestamp, about 31700 years.
pub const MAX_RECORDED_SECS: f64 = 1.0e12;

/// Delivery delays are capped here; anything later is effectively never.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 3600);

/// A point on the recorded-session timeline, in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    pub secs: f64,
}

impl Timestamp {
    pub const MIN: Timestamp = Timestamp { secs: f64::MIN };
    pub const MAX: Timestamp = Timestamp { secs: f64::MAX };

    pub fn from_secs(secs: f64) -> Self {
        Timestamp { secs }
    }

    pub fn offset(&self, secs: f64) -> Self {
        Timestamp { secs: self.secs + secs }
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    pub fn since(&self, earlier: Timestamp) -> f64 {
        self.secs - earlier.secs
    }

    /// Finite and within `MAX_RECORDED_SECS` of zero.
    pub fn is_representable(&self) -> bool {
        self.secs.is_finite() && self.secs.abs() <= MAX_RECORDED_SECS
    }

    pub fn clamp_to(&self, lo: Timestamp, hi: Timestamp) -> Self {
        if *self < lo {
            lo
        } else if *self > hi {
            hi
        } else {
            *self
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.secs.total_cmp(&other.secs)
    }
}

/// Maps recorded time to wall-clock delivery instants.
///
/// `deliver_at(t) = origin_wall + (t - origin_recorded) * scale`. Pauses are
/// absorbed by shifting `origin_wall` forward; seeks re-originate the mapping.
#[derive(Debug, Clone, Copy)]
pub struct ClockTranslator {
    origin_recorded: Timestamp,
    origin_wall: Instant,
    scale: f64,
}

impl ClockTranslator {
    pub fn new(origin_recorded: Timestamp, origin_wall: Instant) -> Self {
        Self {
            origin_recorded,
            origin_wall,
            scale: 1.0,
        }
    }

    pub fn translate(&self, time: Timestamp) -> Instant {
        let offset = time.since(self.origin_recorded) * self.scale;
        if offset.is_nan() || offset <= 0.0 {
            return self.origin_wall;
        }
        let delay = Duration::try_from_secs_f64(offset)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY);
        self.origin_wall
            .checked_add(delay)
            .unwrap_or(self.origin_wall)
    }

    /// Absorb a pause of `paused_for` wall-clock time.
    pub fn shift(&mut self, paused_for: Duration) {
        self.origin_wall += paused_for;
    }

    pub fn reorigin(&mut self, origin_recorded: Timestamp, now: Instant) {
        self.origin_recorded = origin_recorded;
        self.origin_wall = now;
    }

    pub fn origin_recorded(&self) -> Timestamp {
        self.origin_recorded
    }
}
