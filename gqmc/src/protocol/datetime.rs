//! Calendar timestamp codec for the device's real-time clock.
//!
//! The device stores its clock as six raw bytes and performs no validation
//! whatsoever: it will happily store month 0 or hour 31 and misdisplay it.
//! This codec is the validation boundary the hardware lacks — a value that
//! passes [`DateTime::validate`] always round-trips through the device
//! encoding without truncation or silent wraparound.

use crate::error::{Error, Result};

/// Six-field calendar value as the device encodes it.
///
/// The year is the raw 2-digit field (0–99) with an implied 2000 century;
/// no century inference is performed beyond that passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateTime {
    /// Two-digit year (0–99, meaning 2000–2099).
    pub year: u8,
    /// Month (1–12).
    pub month: u8,
    /// Day of month (1–31, checked against month and leap year).
    pub day: u8,
    /// Hour (0–23).
    pub hour: u8,
    /// Minute (0–59).
    pub minute: u8,
    /// Second (0–59).
    pub second: u8,
}

impl DateTime {
    /// Create a value and validate it in one step.
    pub fn new(year: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self> {
        let dt = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        };
        dt.validate()?;
        Ok(dt)
    }

    /// Check every field against the ranges the device display assumes.
    ///
    /// Fields are checked in order: month, day (month- and leap-aware),
    /// hour, minute, second, then the year as a raw 2-digit range check.
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.month) {
            return Err(Error::validation(
                "month",
                format!("{} is not in 1-12", self.month),
            ));
        }
        let max_day = days_in_month(self.year, self.month);
        if !(1..=max_day).contains(&self.day) {
            return Err(Error::validation(
                "day",
                format!(
                    "{} is not in 1-{max_day} for month {} of year 20{:02}",
                    self.day, self.month, self.year
                ),
            ));
        }
        if self.hour > 23 {
            return Err(Error::validation(
                "hour",
                format!("{} is not in 0-23", self.hour),
            ));
        }
        if self.minute > 59 {
            return Err(Error::validation(
                "minute",
                format!("{} is not in 0-59", self.minute),
            ));
        }
        if self.second > 59 {
            return Err(Error::validation(
                "second",
                format!("{} is not in 0-59", self.second),
            ));
        }
        if self.year > 99 {
            return Err(Error::validation(
                "year",
                format!("{} is not a 2-digit year (0-99)", self.year),
            ));
        }
        Ok(())
    }

    /// Serialize into the device's compact field encoding.
    ///
    /// Total over validated values; call [`DateTime::validate`] first.
    pub fn encode(&self) -> [u8; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    /// Deserialize from the device's compact field encoding.
    ///
    /// Total and never fails, but the result is not guaranteed to satisfy
    /// [`DateTime::validate`] — the device may have been set into an invalid
    /// state by other means. Re-check before trusting the value.
    pub fn decode(raw: [u8; 6]) -> Self {
        Self {
            year: raw[0],
            month: raw[1],
            day: raw[2],
            hour: raw[3],
            minute: raw[4],
            second: raw[5],
        }
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Number of days in the given month of year 20YY.
///
/// The device century is 2000–2099 and 2000 is divisible by 400, so the
/// plain `year % 4` test is exact for the whole representable range.
fn days_in_month(year: u8, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 => 29,
        2 => 28,
        _ => 0,
    }
}
