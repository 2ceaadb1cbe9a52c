// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Precision-aware temporal types for FHIRPath.
//!
//! Partial-precision values are first-class: `@2024` and `@2024-01-05` are
//! different values of different precision, and spec.md §4.6/§4.7 require
//! that precision (and, for datetimes, zoned status) gate both equality and
//! ordering rather than being silently normalized away.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// `chrono::FixedOffset` has no serde support, so `PrecisionDateTime`'s
/// `Option<FixedOffset>` field is (de)serialized via its UTC offset in
/// seconds instead.
mod fixed_offset_serde {
    use super::{Deserialize, Deserializer, FixedOffset, Serializer};

    pub fn serialize<S>(value: &Option<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde::Serialize::serialize(&value.map(|o| o.local_minus_utc()), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<i32> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| FixedOffset::east_opt(s).unwrap()))
    }
}

/// Precision levels shared by date and datetime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum TemporalPrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TemporalPrecision {
    /// "Digits of precision" per spec.md §4.4's boundary table: date
    /// precisions are 4/6/8, datetime adds 10/12/14 plus a fractional digit
    /// for millisecond.
    pub fn precision_digits(self) -> u32 {
        match self {
            Self::Year => 4,
            Self::Month => 6,
            Self::Day => 8,
            Self::Hour => 10,
            Self::Minute => 12,
            Self::Second => 14,
            Self::Millisecond => 17,
        }
    }

    /// Digits of precision for a bare time value (no date component).
    pub fn time_precision_digits(self) -> u32 {
        match self {
            Self::Hour => 2,
            Self::Minute => 4,
            Self::Second => 6,
            Self::Millisecond => 9,
            _ => 2,
        }
    }
}

/// A partial-precision date: `@2024`, `@2024-01`, or `@2024-01-05`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDate {
    pub date: NaiveDate,
    pub precision: TemporalPrecision,
}

impl PrecisionDate {
    pub fn new(date: NaiveDate, precision: TemporalPrecision) -> Self {
        Self { date, precision }
    }

    /// Ordering is only decidable when both values share a precision;
    /// otherwise the comparison is undecidable (spec.md §4.7) and the
    /// caller should treat that as "empty", not as any particular order.
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        if self.precision != other.precision {
            return None;
        }
        Some(self.date.cmp(&other.date))
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            _ => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// A partial-precision datetime, zoned or unzoned.
///
/// The teacher's `PrecisionDateTime` always wraps `DateTime<FixedOffset>`,
/// which cannot express "no timezone was written in the source text" —
/// here the offset is optional so an unzoned `@2024-01-05T10:00:00` and a
/// zoned `@2024-01-05T10:00:00Z` stay distinguishable, since spec.md §4.7
/// requires comparison to fail between them even at matching precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionDateTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(with = "fixed_offset_serde")]
    pub offset: Option<FixedOffset>,
    pub precision: TemporalPrecision,
}

impl PrecisionDateTime {
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        offset: Option<FixedOffset>,
        precision: TemporalPrecision,
    ) -> Self {
        Self {
            date,
            time,
            offset,
            precision,
        }
    }

    pub fn is_zoned(&self) -> bool {
        self.offset.is_some()
    }

    /// An absolute instant, normalized to UTC, for ordering zoned values.
    /// Only meaningful when `is_zoned()` is true.
    fn as_utc(&self) -> DateTime<FixedOffset> {
        let offset = self.offset.unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        offset
            .from_local_datetime(&self.date.and_time(self.time))
            .single()
            .unwrap_or_else(|| offset.from_utc_datetime(&self.date.and_time(self.time)))
    }

    /// Ordering requires matching precision and matching zoned status
    /// (spec.md §4.7); anything else is undecidable.
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        if self.precision != other.precision || self.is_zoned() != other.is_zoned() {
            return None;
        }
        if self.is_zoned() {
            Some(self.as_utc().cmp(&other.as_utc()))
        } else {
            Some((self.date, self.time).cmp(&(other.date, other.time)))
        }
    }
}

use chrono::TimeZone;

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let naive = self.date.and_time(self.time);
        let offset_str = |o: FixedOffset| {
            if o.local_minus_utc() == 0 {
                "Z".to_string()
            } else {
                o.to_string()
            }
        };
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            TemporalPrecision::Day => write!(f, "{}", self.date.format("%Y-%m-%d")),
            TemporalPrecision::Hour => {
                write!(f, "{}", naive.format("%Y-%m-%dT%H"))?;
                if let Some(o) = self.offset {
                    write!(f, "{}", offset_str(o))?;
                }
                Ok(())
            }
            TemporalPrecision::Minute => {
                write!(f, "{}", naive.format("%Y-%m-%dT%H:%M"))?;
                if let Some(o) = self.offset {
                    write!(f, "{}", offset_str(o))?;
                }
                Ok(())
            }
            TemporalPrecision::Second => {
                write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S"))?;
                if let Some(o) = self.offset {
                    write!(f, "{}", offset_str(o))?;
                }
                Ok(())
            }
            TemporalPrecision::Millisecond => {
                write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S%.3f"))?;
                if let Some(o) = self.offset {
                    write!(f, "{}", offset_str(o))?;
                }
                Ok(())
            }
        }
    }
}

/// A partial-precision bare time: `@T10`, `@T10:30`, `@T10:30:00.000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionTime {
    pub time: NaiveTime,
    pub precision: TemporalPrecision,
}

impl PrecisionTime {
    pub fn new(time: NaiveTime, precision: TemporalPrecision) -> Self {
        Self { time, precision }
    }

    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        if self.precision != other.precision {
            return None;
        }
        Some(self.time.cmp(&other.time))
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Hour => write!(f, "{}", self.time.format("%H")),
            TemporalPrecision::Minute => write!(f, "{}", self.time.format("%H:%M")),
            TemporalPrecision::Second => write!(f, "{}", self.time.format("%H:%M:%S")),
            TemporalPrecision::Millisecond => write!(f, "{}", self.time.format("%H:%M:%S%.3f")),
            _ => write!(f, "{}", self.time.format("%H:%M")),
        }
    }
}

/// True if `a` and `b` carry enough shared precision to decide equality,
/// per spec.md §4.6 ("`=` returns empty if either precision does not
/// suffice to decide"). Distinct from ordering: equality at matching
/// precision just compares the stored fields directly.
pub fn dates_equal(a: &PrecisionDate, b: &PrecisionDate) -> Option<bool> {
    if a.precision != b.precision {
        return None;
    }
    Some(a.date == b.date)
}

pub fn datetimes_equal(a: &PrecisionDateTime, b: &PrecisionDateTime) -> Option<bool> {
    if a.precision != b.precision || a.is_zoned() != b.is_zoned() {
        return None;
    }
    Some(a.partial_compare(b) == Some(Ordering::Equal))
}

pub fn times_equal(a: &PrecisionTime, b: &PrecisionTime) -> Option<bool> {
    if a.precision != b.precision {
        return None;
    }
    Some(a.time == b.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn year_vs_month_precision_is_undecidable() {
        let a = PrecisionDate::new(date(2024, 1, 1), TemporalPrecision::Year);
        let b = PrecisionDate::new(date(2024, 2, 1), TemporalPrecision::Month);
        assert_eq!(a.partial_compare(&b), None);
        assert_eq!(dates_equal(&a, &b), None);
    }

    #[test]
    fn same_precision_dates_compare() {
        let a = PrecisionDate::new(date(2024, 1, 1), TemporalPrecision::Day);
        let b = PrecisionDate::new(date(2024, 2, 1), TemporalPrecision::Day);
        assert_eq!(a.partial_compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn zoned_vs_unzoned_datetime_is_undecidable() {
        let zoned = PrecisionDateTime::new(
            date(2024, 1, 5),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            Some(FixedOffset::east_opt(0).unwrap()),
            TemporalPrecision::Second,
        );
        let unzoned = PrecisionDateTime::new(
            date(2024, 1, 5),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            None,
            TemporalPrecision::Second,
        );
        assert_eq!(zoned.partial_compare(&unzoned), None);
        assert_eq!(datetimes_equal(&zoned, &unzoned), None);
    }

    #[test]
    fn zoned_datetimes_compare_across_offsets() {
        let a = PrecisionDateTime::new(
            date(2024, 1, 5),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            Some(FixedOffset::east_opt(0).unwrap()),
            TemporalPrecision::Second,
        );
        let b = PrecisionDateTime::new(
            date(2024, 1, 5),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            Some(FixedOffset::west_opt(4 * 3600).unwrap()),
            TemporalPrecision::Second,
        );
        assert_eq!(a.partial_compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn display_formats_by_precision() {
        let d = PrecisionDate::new(date(2024, 3, 1), TemporalPrecision::Month);
        assert_eq!(d.to_string(), "2024-03");
    }
}
