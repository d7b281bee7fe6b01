// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule model and next-fire evaluation
//!
//! A schedule is a set of times of day, a set of weekdays, and an optional
//! from/to date window. Evaluation is a pure function of the schedule and a
//! reference instant: it never reads a clock, so tests pin "now" exactly.
//!
//! Window endpoints with `year: 0` resolve against the reference year. When
//! a resolved window is inverted (e.g. Dec 15 → Jan 15) the endpoint years
//! are shifted so the window straddles the reference: windows that span the
//! new year behave the same in December and in January.

pub mod parser;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A day of the week. Wire format is an integer with 0 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    fn days_from_sunday(self) -> u32 {
        self as u32
    }
}

impl From<Weekday> for u8 {
    fn from(day: Weekday) -> u8 {
        day as u8
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Weekday::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("weekday out of range: {value}"))
    }
}

/// A time of day with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
    #[serde(default)]
    pub millisecond: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            second: 0,
            millisecond: 0,
        }
    }

    /// None when the fields do not name a valid wall-clock time
    fn time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_milli_opt(self.hour, self.minute, self.second, self.millisecond)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hour, self.minute, self.second, self.millisecond
        )
    }
}

/// A window endpoint. `year: 0` means "resolve against the reference year".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpec {
    #[serde(default)]
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateSpec {
    fn resolve(&self, reference_year: i32) -> Option<NaiveDate> {
        let year = if self.year == 0 {
            reference_year
        } else {
            self.year
        };
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }

    fn is_auto(&self) -> bool {
        self.year == 0
    }
}

fn default_weekdays() -> Vec<Weekday> {
    Weekday::ALL.to_vec()
}

/// When a program fires: times of day on weekdays, within an optional
/// from/to date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub times: Vec<TimeOfDay>,
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<Weekday>,
    #[serde(default)]
    pub from: Option<DateSpec>,
    #[serde(default)]
    pub to: Option<DateSpec>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            weekdays: default_weekdays(),
            from: None,
            to: None,
        }
    }
}

impl Schedule {
    /// The earliest instant `t >= reference` matching this schedule, or
    /// `None` if the schedule is unarmed or no candidate fits the window.
    pub fn next_run_after(&self, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.times.is_empty() || self.weekdays.is_empty() {
            return None;
        }

        let (from, to) = self.resolve_window(reference)?;

        let mut reference = reference;
        if let Some(from) = from {
            let window_open = from.and_time(NaiveTime::MIN);
            if window_open > reference {
                reference = window_open;
            }
        }
        // Exclusive upper bound: midnight after the `to` date.
        let window_close = match to {
            Some(to) => Some(to.checked_add_days(Days::new(1))?.and_time(NaiveTime::MIN)),
            None => None,
        };

        let mut next: Option<NaiveDateTime> = None;
        for weekday in &self.weekdays {
            let day = next_day_with_weekday(reference.date(), *weekday);
            for tod in &self.times {
                let Some(time) = tod.time() else {
                    continue;
                };
                let mut candidate = day.and_time(time);
                if candidate < reference {
                    candidate += chrono::Duration::weeks(1);
                }
                if let Some(close) = window_close {
                    if candidate >= close {
                        continue;
                    }
                }
                if next.map_or(true, |best| candidate < best) {
                    next = Some(candidate);
                }
            }
        }
        next
    }

    /// Resolve window endpoints against the reference year, shifting an
    /// inverted auto-year window by one year so it straddles the reference.
    /// Outer `None` means an endpoint does not name a real date.
    fn resolve_window(
        &self,
        reference: NaiveDateTime,
    ) -> Option<(Option<NaiveDate>, Option<NaiveDate>)> {
        let year = reference.date().year();
        match (&self.from, &self.to) {
            (None, None) => Some((None, None)),
            (Some(from), None) => Some((Some(from.resolve(year)?), None)),
            (None, Some(to)) => Some((None, Some(to.resolve(year)?))),
            (Some(from), Some(to)) => {
                let mut from_date = from.resolve(year)?;
                let mut to_date = to.resolve(year)?;
                if from.is_auto() && to.is_auto() && from_date > to_date {
                    if reference.date() <= to_date {
                        from_date = from_date.with_year(year - 1)?;
                    } else {
                        to_date = to_date.with_year(year + 1)?;
                    }
                }
                Some((Some(from_date), Some(to_date)))
            }
        }
    }

    /// Armed schedules have at least one time and one weekday
    pub fn is_armed(&self) -> bool {
        !self.times.is_empty() && !self.weekdays.is_empty()
    }
}

/// The first date on or after `date` falling on `weekday`
fn next_day_with_weekday(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = date.weekday().num_days_from_sunday();
    let target = weekday.days_from_sunday();
    let diff = (target + 7 - current) % 7;
    date.checked_add_days(Days::new(diff as u64)).unwrap_or(date)
}

#[cfg(test)]
#[path = "sched_tests.rs"]
mod tests;
