//! Calendars and calendar periods.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Offsets beyond this many days leave the range of dates chrono can represent.
const MAX_DAYS: f64 = 262_143. * 366.;

/// The calendar of a time axis, as named by the CF `calendar` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Proleptic Gregorian.
    #[default]
    Standard,

    /// Every year has 365 days.
    NoLeap,

    /// Every year has 366 days.
    AllLeap,
}

impl FromStr for Calendar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Standard),
            "noleap" | "no_leap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            other => Err(Error::argument(format!("unsupported calendar: {other}"))),
        }
    }
}

impl Calendar {
    #[must_use]
    pub fn is_leap(self, year: i32) -> bool {
        match self {
            Calendar::Standard => (year % 4 == 0 && year % 100 != 0) || year % 400 == 0,
            Calendar::NoLeap => false,
            Calendar::AllLeap => true,
        }
    }

    /// Number of days in `month` (1-12) of `year`.
    #[must_use]
    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        debug_assert!((1..=12).contains(&month));

        if month == 2 && self.is_leap(year) {
            29
        } else {
            DAYS[month as usize - 1]
        }
    }

    #[must_use]
    pub fn days_in_year(self, year: i32) -> u32 {
        if self.is_leap(year) {
            366
        } else {
            365
        }
    }

    /// `epoch` advanced by `days` (may be fractional or negative) counted in this calendar.
    ///
    /// Dates of the `all_leap` calendar that do not exist in the Gregorian calendar (February
    /// 29th of a common year) are clamped to the last day of the month.
    #[must_use]
    pub fn add_days(self, epoch: NaiveDateTime, days: f64) -> Option<NaiveDateTime> {
        if !days.is_finite() || days.abs() > MAX_DAYS {
            return None;
        }

        if self == Calendar::Standard {
            let ms = (days * 86_400_000.).round() as i64;
            return epoch.checked_add_signed(Duration::milliseconds(ms));
        }

        // Seconds within the day, carrying whole days.
        let secs = i64::from(epoch.time().num_seconds_from_midnight())
            + (days.fract() * 86_400.).round() as i64;
        let whole = (days.trunc() as i64).checked_add(secs.div_euclid(86_400))?;
        let secs = secs.rem_euclid(86_400);

        let mut year = epoch.year();
        let mut doy = i64::from(
            (1..epoch.month())
                .map(|m| self.days_in_month(year, m))
                .sum::<u32>()
                + epoch.day()
                - 1,
        )
        .checked_add(whole)?;

        while doy >= i64::from(self.days_in_year(year)) {
            doy -= i64::from(self.days_in_year(year));
            year += 1;
        }
        while doy < 0 {
            year -= 1;
            doy += i64::from(self.days_in_year(year));
        }

        let mut month = 1;
        while doy >= i64::from(self.days_in_month(year, month)) {
            doy -= i64::from(self.days_in_month(year, month));
            month += 1;
        }

        let day = (doy as u32 + 1).min(Calendar::Standard.days_in_month(year, month));

        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(Duration::seconds(secs))
    }
}

/// A calendar period that time samples are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Calendar years, starting in January.
    Annual,

    /// Three-month seasons, one of which starts in the `anchor` month (1-12). With anchor 12 the
    /// seasons are DJF, MAM, JJA and SON, and January and February belong to the season that
    /// started in December of the previous year.
    Quarterly { anchor: u32 },
}

impl Period {
    pub fn quarterly(anchor: u32) -> Result<Period> {
        if (1..=12).contains(&anchor) {
            Ok(Period::Quarterly { anchor })
        } else {
            Err(Error::argument(format!(
                "quarter anchor month must be within 1..=12, got {anchor}"
            )))
        }
    }

    /// December anchored quarters: DJF, MAM, JJA, SON.
    #[must_use]
    pub fn seasons() -> Period {
        Period::Quarterly { anchor: 12 }
    }

    #[must_use]
    pub fn months(self) -> u32 {
        match self {
            Period::Annual => 12,
            Period::Quarterly { .. } => 3,
        }
    }

    /// Start of the period containing `t`.
    #[must_use]
    pub fn start(self, t: NaiveDateTime) -> NaiveDate {
        let (mut year, month) = (t.year(), t.month() as i32);

        let m0 = match self {
            Period::Annual => 1,
            Period::Quarterly { anchor } => {
                let m0 = month - (month + 12 - anchor as i32).rem_euclid(3);
                if m0 < 1 {
                    year -= 1;
                    m0 + 12
                } else {
                    m0
                }
            }
        };

        NaiveDate::from_ymd_opt(year, m0 as u32, 1).unwrap_or(t.date())
    }

    /// Start of the period following the one starting at `start`.
    #[must_use]
    pub fn next(self, start: NaiveDate) -> Option<NaiveDate> {
        let m = start.month0() + self.months();
        NaiveDate::from_ymd_opt(start.year() + (m / 12) as i32, m % 12 + 1, 1)
    }
}
