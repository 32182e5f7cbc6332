//! Calendar interval specifications.
//!
//! An [`IntervalSpec`] is a sparse calendar-unit to count mapping such as "1 day" or
//! "1 month 2 weeks". It describes statistics-collection buckets and anchor offsets.

use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Calendar units, ordered from largest to smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl CalendarUnit {
    pub const ALL: [CalendarUnit; 7] = [
        CalendarUnit::Year,
        CalendarUnit::Month,
        CalendarUnit::Week,
        CalendarUnit::Day,
        CalendarUnit::Hour,
        CalendarUnit::Minute,
        CalendarUnit::Second,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalendarUnit::Year => "year",
            CalendarUnit::Month => "month",
            CalendarUnit::Week => "week",
            CalendarUnit::Day => "day",
            CalendarUnit::Hour => "hour",
            CalendarUnit::Minute => "minute",
            CalendarUnit::Second => "second",
        }
    }

    pub fn parse(name: &str) -> RecordsResult<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str() == name)
            .ok_or_else(|| RecordsError::UnknownCalendarUnit(name.to_owned()))
    }

    fn seconds(self) -> Option<i64> {
        match self {
            CalendarUnit::Year | CalendarUnit::Month => None,
            CalendarUnit::Week => Some(7 * 86_400),
            CalendarUnit::Day => Some(86_400),
            CalendarUnit::Hour => Some(3_600),
            CalendarUnit::Minute => Some(60),
            CalendarUnit::Second => Some(1),
        }
    }
}

/// Sparse mapping from calendar unit to count.
///
/// Units set to zero are kept, so `{day: 0}` renders back as `day='0'`. A spec whose counts
/// are all zero is [empty](IntervalSpec::is_empty); whether that is acceptable is up to the
/// caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalSpec(BTreeMap<CalendarUnit, i64>);

impl IntervalSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`IntervalSpec::set`].
    pub fn with(mut self, unit: CalendarUnit, count: i64) -> Self {
        self.set(unit, count);
        self
    }

    pub fn set(&mut self, unit: CalendarUnit, count: i64) {
        self.0.insert(unit, count);
    }

    pub fn get(&self, unit: CalendarUnit) -> Option<i64> {
        self.0.get(&unit).copied()
    }

    /// Components in calendar order, largest unit first.
    pub fn components(&self) -> impl Iterator<Item = (CalendarUnit, i64)> + '_ {
        self.0.iter().map(|(unit, count)| (*unit, *count))
    }

    /// True when no unit has a non-zero count.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|count| *count == 0)
    }

    /// Move `instant` forward by this interval.
    ///
    /// Months and years are applied first as calendar months, clamping to the end of shorter
    /// months; the fixed-length units follow.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::InvalidInput`] if the result falls outside the representable range.
    pub fn advance(&self, instant: DateTime<Utc>) -> RecordsResult<DateTime<Utc>> {
        self.nth(instant, 1)
    }

    /// The instant `n` whole intervals after `anchor`.
    ///
    /// Computed from the anchor in one step, so month clamping does not accumulate.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::InvalidInput`] if the result falls outside the representable range.
    pub fn nth(&self, anchor: DateTime<Utc>, n: i64) -> RecordsResult<DateTime<Utc>> {
        let overflow = || RecordsError::InvalidInput("interval arithmetic overflowed".into());

        let mut months: i64 = 0;
        let mut seconds: i64 = 0;
        for (unit, count) in self.components() {
            let count = count.checked_mul(n).ok_or_else(overflow)?;
            match unit {
                CalendarUnit::Year => {
                    months = count
                        .checked_mul(12)
                        .and_then(|m| months.checked_add(m))
                        .ok_or_else(overflow)?;
                }
                CalendarUnit::Month => months = months.checked_add(count).ok_or_else(overflow)?,
                fixed => {
                    let step = fixed.seconds().unwrap_or(0);
                    seconds = count
                        .checked_mul(step)
                        .and_then(|s| seconds.checked_add(s))
                        .ok_or_else(overflow)?;
                }
            }
        }

        let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| overflow())?;
        let shifted = if months >= 0 {
            anchor.checked_add_months(Months::new(magnitude))
        } else {
            anchor.checked_sub_months(Months::new(magnitude))
        }
        .ok_or_else(overflow)?;

        let delta = Duration::try_seconds(seconds).ok_or_else(overflow)?;
        shifted.checked_add_signed(delta).ok_or_else(overflow)
    }
}

impl FromIterator<(CalendarUnit, i64)> for IntervalSpec {
    fn from_iter<T: IntoIterator<Item = (CalendarUnit, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
