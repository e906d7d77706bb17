//! Simulation time.

use std::{fmt, ops};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date of the Unix epoch.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian date of J2000.0.
pub const J2000: f64 = 2_451_545.0;

/// Elapsed simulation time.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SimTime(Duration);

impl SimTime {
    pub fn new_seconds(sec: f64) -> Self {
        Self(Duration::seconds_f64(sec))
    }

    pub fn as_seconds(self) -> f64 {
        self.0.as_seconds_f64()
    }

    pub fn as_days(self) -> f64 {
        self.as_seconds() / SECONDS_PER_DAY
    }

    pub fn days(self) -> i64 {
        self.0.whole_days()
    }

    pub fn hours(self) -> u8 {
        (self.0.whole_hours() % 24).unsigned_abs() as u8
    }

    pub fn minutes(self) -> u8 {
        (self.0.whole_minutes() % 60).unsigned_abs() as u8
    }

    pub fn seconds(self) -> u8 {
        (self.0.whole_seconds() % 60).unsigned_abs() as u8
    }

    pub fn millis(self) -> u16 {
        (self.0.whole_milliseconds() % 1000).unsigned_abs() as u16
    }

    pub fn into_duration(self) -> Duration {
        self.0
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }
}

impl ops::Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ops::Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        SimTime(self.0 + rhs)
    }
}

impl ops::AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T+{}:{:02}:{:02}:{:02}.{:>03}",
            self.days(),
            self.hours(),
            self.minutes(),
            self.seconds(),
            self.millis()
        )
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Wall-clock epoch plus elapsed simulation time; the Julian date
/// service for orbit evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    #[serde(with = "time::serde::rfc3339")]
    pub epoch: OffsetDateTime,
    pub elapsed: SimTime,
    pub tick: u64,
}

impl SimClock {
    pub fn new(epoch: OffsetDateTime) -> Self {
        Self {
            epoch,
            elapsed: SimTime::default(),
            tick: 0,
        }
    }

    /// A clock starting at J2000.0 (2000-01-01 12:00 UTC).
    pub fn j2000() -> Self {
        let since_unix = Duration::seconds_f64((J2000 - UNIX_EPOCH_JD) * SECONDS_PER_DAY);
        Self::new(OffsetDateTime::UNIX_EPOCH + since_unix)
    }

    pub fn epoch_julian_date(&self) -> f64 {
        self.epoch.unix_timestamp_nanos() as f64 / 1e9 / SECONDS_PER_DAY + UNIX_EPOCH_JD
    }

    pub fn julian_date(&self) -> f64 {
        self.epoch_julian_date() + self.elapsed.as_days()
    }

    pub fn now(&self) -> OffsetDateTime {
        self.epoch + self.elapsed.into_duration()
    }

    pub fn advance(&mut self, dt: f64) {
        self.elapsed += Duration::seconds_f64(dt);
        self.tick += 1;
    }
}
