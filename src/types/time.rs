//! Time stamps in the service's epoch (1990-01-01 00:00:00 UTC)

use chrono::{DateTime, Local, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the Unix epoch and the service epoch.
pub const EPOCH_OFFSET: i64 = 631_152_000;

const FRACTION_SCALE: [u32; 10] = [
    1_000_000_000,
    100_000_000,
    10_000_000,
    1_000_000,
    100_000,
    10_000,
    1_000,
    100,
    10,
    1,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeStamp {
    pub secs_past_epoch: u32,
    pub nanos: u32,
}

impl TimeStamp {
    pub const fn new(secs_past_epoch: u32, nanos: u32) -> Self {
        Self {
            secs_past_epoch,
            nanos,
        }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Times before the service epoch clamp to the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs = (since_unix.as_secs() as i64 - EPOCH_OFFSET).clamp(0, u32::MAX as i64);
        Self {
            secs_past_epoch: secs as u32,
            nanos: since_unix.subsec_nanos(),
        }
    }

    /// Seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        self.secs_past_epoch as i64 + EPOCH_OFFSET
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.unix_seconds(), self.nanos.min(999_999_999))
            .single()
            .unwrap_or_default()
    }

    pub fn as_f64(&self) -> f64 {
        self.secs_past_epoch as f64 + self.nanos as f64 * 1e-9
    }

    /// `YYYY-MM-DD HH:MM:SS` in UTC, with `precision` (capped at 9)
    /// fractional digits when positive.
    pub fn utc_image(&self, precision: i32) -> String {
        self.image_of(&self.to_utc(), precision)
    }

    /// As [`utc_image`](Self::utc_image) but in local time.
    pub fn local_image(&self, precision: i32) -> String {
        self.image_of(&self.to_utc().with_timezone(&Local), precision)
    }

    fn image_of<Tz: TimeZone>(&self, when: &DateTime<Tz>, precision: i32) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut text = when.format("%Y-%m-%d %H:%M:%S").to_string();
        if precision > 0 {
            let p = precision.min(9) as usize;
            let fraction = self.nanos.min(999_999_999) / FRACTION_SCALE[p];
            text.push_str(&format!(".{:0width$}", fraction, width = p));
        }
        text
    }
}
