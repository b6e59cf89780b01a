//! CF time coordinates: `<unit> since <reference date>` in some [`Calendar`].
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::str::FromStr;

use crate::ops::calendar::Calendar;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn days(self) -> f64 {
        match self {
            TimeUnit::Days => 1.,
            TimeUnit::Hours => 1. / 24.,
            TimeUnit::Minutes => 1. / 1_440.,
            TimeUnit::Seconds => 1. / 86_400.,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Ok(TimeUnit::Days),
            "hours" | "hour" | "hr" | "h" => Ok(TimeUnit::Hours),
            "minutes" | "minute" | "min" => Ok(TimeUnit::Minutes),
            "seconds" | "second" | "sec" | "s" => Ok(TimeUnit::Seconds),
            other => Err(Error::InvalidCoordinates(format!("unsupported time unit: {other}"))),
        }
    }
}

/// Decoder for the values of a time coordinate variable.
///
/// ```
/// use enstrend::source::cf::TimeUnits;
/// use enstrend::ops::calendar::Calendar;
///
/// let u = TimeUnits::parse("days since 1850-01-01", Calendar::NoLeap).unwrap();
/// let t = u.decode(&[0., 365.]).unwrap();
/// assert_eq!(t[1].to_string(), "1851-01-01 00:00:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: NaiveDateTime,
    pub calendar: Calendar,
}

impl TimeUnits {
    pub fn parse(units: &str, calendar: Calendar) -> Result<TimeUnits> {
        let bad = || Error::InvalidCoordinates(format!("not a CF time unit: {units:?}"));

        let mut words = units.trim().splitn(3, char::is_whitespace);
        let unit = words.next().ok_or_else(bad)?.parse()?;
        if !words.next().is_some_and(|w| w.eq_ignore_ascii_case("since")) {
            return Err(bad());
        }
        let epoch = parse_epoch(words.next().ok_or_else(bad)?.trim()).ok_or_else(bad)?;

        Ok(TimeUnits {
            unit,
            epoch,
            calendar,
        })
    }

    /// Timestamps of `values`. Fails on non-finite or out of range values.
    pub fn decode(&self, values: &[f64]) -> Result<Vec<NaiveDateTime>> {
        values
            .iter()
            .map(|&v| {
                self.calendar
                    .add_days(self.epoch, v * self.unit.days())
                    .ok_or_else(|| Error::InvalidCoordinates(format!("time value {v} can not be decoded")))
            })
            .collect()
    }
}

/// `1850-1-1`, `1850-01-01 00:00:00`, `1850-01-01T12:00:00Z` and similar.
fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_end_matches(" UTC").trim_end_matches('Z');
    let (date, time) = match s.split_once(|c: char| c == ' ' || c == 'T') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (s, None),
    };

    let mut ymd = date.splitn(3, '-');
    let y = ymd.next()?.parse::<i32>().ok()?;
    let m = ymd.next().map_or(Some(1), |m| m.parse::<u32>().ok())?;
    let d = ymd.next().map_or(Some(1), |d| d.parse::<u32>().ok())?;
    let date = NaiveDate::from_ymd_opt(y, m, d)?;

    let time = match time {
        None | Some("") => NaiveTime::from_hms_opt(0, 0, 0)?,
        Some(t) => {
            let mut hms = t.splitn(3, ':');
            let h = hms.next()?.parse::<u32>().ok()?;
            let mi = hms.next().map_or(Some(0), |v| v.parse::<u32>().ok())?;
            let s = hms.next().map_or(Some(0.), |v| v.parse::<f64>().ok())?;
            NaiveTime::from_hms_milli_opt(h, mi, s.trunc() as u32, (s.fract() * 1000.).round() as u32)?
        }
    };

    Some(date.and_time(time))
}
