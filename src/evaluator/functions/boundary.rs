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

//! `lowBoundary highBoundary precision` (spec.md §4.4, Boundary group).
//!
//! A partial-precision temporal already stores the low end of its range —
//! `@2024` is represented as midnight on 2024-01-01 — so `lowBoundary`
//! expands only the time-of-day fields a coarser precision left implicit.
//! `highBoundary` additionally has to fill the *date* fields forward to
//! the last day of the year or month. Decimal boundaries use half a unit
//! in the last significant place at the value's own (or requested) scale.

use super::require_singleton;
use crate::error::{FhirPathError, Result};
use crate::model::temporal::TemporalPrecision;
use crate::model::{Collection, PrecisionDate, PrecisionDateTime, PrecisionTime, Value};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rust_decimal::Decimal;

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Map a requested "digits of precision" (spec.md §4.4's table) down to
/// the coarsest [`TemporalPrecision`] it covers, for the optional
/// `boundary(precision)` argument.
fn digits_to_precision(digits: u32) -> TemporalPrecision {
    match digits {
        0..=4 => TemporalPrecision::Year,
        5..=6 => TemporalPrecision::Month,
        7..=8 => TemporalPrecision::Day,
        9..=10 => TemporalPrecision::Hour,
        11..=12 => TemporalPrecision::Minute,
        13..=14 => TemporalPrecision::Second,
        _ => TemporalPrecision::Millisecond,
    }
}

fn date_bound(date: NaiveDate, precision: TemporalPrecision, high: bool) -> NaiveDate {
    if !high {
        return date;
    }
    match precision {
        TemporalPrecision::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
        TemporalPrecision::Month => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), last_day_of_month(date.year(), date.month()))
                .unwrap_or(date)
        }
        _ => date,
    }
}

fn time_bound(time: NaiveTime, precision: TemporalPrecision, high: bool) -> NaiveTime {
    let (h, m, s, ms) = (time.hour(), time.minute(), time.second(), time.nanosecond() / 1_000_000);
    let filled_hm = if high { 59 } else { 0 };
    let filled_hour = if high { 23 } else { 0 };
    let filled_ms = if high { 999 } else { 0 };
    let (h, m, s, ms) = match precision {
        TemporalPrecision::Year | TemporalPrecision::Month | TemporalPrecision::Day => {
            (filled_hour, filled_hm, filled_hm, filled_ms)
        }
        TemporalPrecision::Hour => (h, filled_hm, filled_hm, filled_ms),
        TemporalPrecision::Minute => (h, m, filled_hm, filled_ms),
        TemporalPrecision::Second => (h, m, s, filled_ms),
        TemporalPrecision::Millisecond => (h, m, s, ms),
    };
    NaiveTime::from_hms_milli_opt(h, m, s, ms).unwrap_or(time)
}

fn boundary_date(d: &PrecisionDate, high: bool) -> PrecisionDate {
    PrecisionDate::new(date_bound(d.date, d.precision, high), TemporalPrecision::Day)
}

fn boundary_datetime(dt: &PrecisionDateTime, precision_arg: Option<u32>, high: bool) -> PrecisionDateTime {
    let effective = precision_arg.map(digits_to_precision).unwrap_or(dt.precision);
    let date = date_bound(dt.date, effective, high);
    let time = time_bound(dt.time, effective, high);
    PrecisionDateTime::new(date, time, dt.offset, TemporalPrecision::Millisecond)
}

fn boundary_time(t: &PrecisionTime, precision_arg: Option<u32>, high: bool) -> PrecisionTime {
    let effective = precision_arg.map(digits_to_precision).unwrap_or(t.precision);
    PrecisionTime::new(time_bound(t.time, effective, high), TemporalPrecision::Millisecond)
}

fn decimal_boundary(d: Decimal, target_scale: Option<u32>, high: bool) -> Decimal {
    let scale = target_scale.unwrap_or_else(|| d.scale());
    let half_ulp = Decimal::new(5, scale + 1);
    let shifted = if high { d + half_ulp } else { d - half_ulp };
    shifted.round_dp(scale + 1)
}

fn boundary(receiver: &Collection, fn_name: &str, precision: Option<i64>, high: bool) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, fn_name)? else {
        return Ok(Collection::empty());
    };
    let digits = precision.map(|p| p.max(0) as u32);
    let result = match value {
        Value::Decimal(d) => Value::Decimal(decimal_boundary(*d, digits, high)),
        Value::Integer(i) => Value::Decimal(decimal_boundary(Decimal::from(*i), digits.or(Some(0)), high)),
        Value::Date(d) => Value::Date(boundary_date(d, high)),
        Value::DateTime(dt) => Value::DateTime(boundary_datetime(dt, digits, high)),
        Value::Time(t) => Value::Time(boundary_time(t, digits, high)),
        other => {
            return Err(FhirPathError::type_error(format!(
                "{fn_name} requires a Decimal, Date, DateTime, or Time receiver, got {}",
                other.type_of()
            )));
        }
    };
    Ok(Collection::singleton(result))
}

pub fn low_boundary(receiver: &Collection, precision: Option<i64>) -> Result<Collection> {
    boundary(receiver, "lowBoundary", precision, false)
}

pub fn high_boundary(receiver: &Collection, precision: Option<i64>) -> Result<Collection> {
    boundary(receiver, "highBoundary", precision, true)
}

pub fn precision(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "precision")? else {
        return Ok(Collection::empty());
    };
    let digits = match value {
        Value::Decimal(d) => d.scale(),
        Value::Integer(_) | Value::Long(_) => 0,
        Value::Date(d) => d.precision.precision_digits(),
        Value::DateTime(dt) => dt.precision.precision_digits(),
        Value::Time(t) => t.precision.time_precision_digits(),
        other => {
            return Err(FhirPathError::type_error(format!(
                "precision requires a numeric or temporal receiver, got {}",
                other.type_of()
            )));
        }
    };
    Ok(Collection::singleton(Value::Integer(digits as i32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_boundaries_straddle_the_stored_value() {
        let c = Collection::singleton(Value::Decimal(dec!(1.5)));
        assert_eq!(low_boundary(&c, None).unwrap(), Collection::singleton(Value::Decimal(dec!(1.45))));
        assert_eq!(high_boundary(&c, None).unwrap(), Collection::singleton(Value::Decimal(dec!(1.55))));
    }

    #[test]
    fn year_precision_date_high_boundary_reaches_december() {
        let d = PrecisionDate::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), TemporalPrecision::Year);
        let c = Collection::singleton(Value::Date(d));
        let result = high_boundary(&c, None).unwrap();
        match result.as_singleton() {
            Some(Value::Date(d)) => assert_eq!(d.date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
            _ => panic!("expected a Date"),
        }
    }

    #[test]
    fn day_precision_datetime_low_boundary_zeros_the_time() {
        let dt = PrecisionDateTime::new(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            None,
            TemporalPrecision::Day,
        );
        let c = Collection::singleton(Value::DateTime(dt));
        let result = low_boundary(&c, None).unwrap();
        match result.as_singleton() {
            Some(Value::DateTime(dt)) => {
                assert_eq!(dt.time, NaiveTime::from_hms_milli_opt(0, 0, 0, 0).unwrap());
                assert_eq!(dt.precision, TemporalPrecision::Millisecond);
            }
            _ => panic!("expected a DateTime"),
        }
    }

    #[test]
    fn precision_reports_digits_for_each_kind() {
        let date = Collection::singleton(Value::Date(PrecisionDate::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            TemporalPrecision::Month,
        )));
        assert_eq!(precision(&date).unwrap(), Collection::singleton(Value::Integer(6)));
    }
}
