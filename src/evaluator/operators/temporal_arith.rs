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

//! `Temporal ± Quantity` (spec.md §4.8). The result keeps the operand's
//! precision tag — arithmetic is always performed against the full
//! underlying date/time value, never a precision-truncated approximation,
//! but a quantity whose unit is finer than what the temporal value can
//! represent (e.g. adding minutes to a `Time` built from hours alone would
//! still be meaningful, so only genuinely incompatible combinations, like
//! adding hours to a `Date`, are rejected as empty).

use crate::ast::BinaryOperator;
use crate::error::{FhirPathError, Result};
use crate::model::temporal::TemporalPrecision;
use crate::model::{PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity, Value};
use chrono::{Duration, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

fn unit_of(code: &str) -> Option<Unit> {
    Some(match code {
        "a" => Unit::Year,
        "mo" => Unit::Month,
        "wk" => Unit::Week,
        "d" => Unit::Day,
        "h" => Unit::Hour,
        "min" => Unit::Minute,
        "s" => Unit::Second,
        "ms" => Unit::Millisecond,
        _ => return None,
    })
}

fn signed_count(value: Decimal) -> i64 {
    value.round().to_i64().unwrap_or(0)
}

fn signed_nanos(value: Decimal, nanos_per_unit: i64) -> i64 {
    (value * Decimal::from(nanos_per_unit)).round().to_i64().unwrap_or(0)
}

pub fn eval_temporal_arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<Option<Value>> {
    let sign = match op {
        BinaryOperator::Add => 1,
        BinaryOperator::Subtract => -1,
        _ => {
            return Err(FhirPathError::type_error(format!(
                "operator {} is not defined between a temporal value and a quantity",
                op.as_str()
            )));
        }
    };
    let Value::Quantity(quantity) = right else {
        return Err(FhirPathError::type_error("expected a Quantity operand for temporal arithmetic"));
    };
    let Some(unit) = unit_of(&quantity.unit) else {
        return Err(FhirPathError::type_error(format!(
            "'{}' is not a calendar-duration unit usable in temporal arithmetic",
            quantity.unit
        )));
    };
    let amount = quantity.value * Decimal::from(sign);

    match left {
        Value::Date(date) => Ok(shift_date(date, unit, amount).map(Value::Date)),
        Value::DateTime(datetime) => Ok(shift_datetime(datetime, unit, amount).map(Value::DateTime)),
        Value::Time(time) => Ok(shift_time(time, unit, amount).map(Value::Time)),
        _ => Err(FhirPathError::type_error("expected a temporal value for temporal arithmetic")),
    }
}

fn shift_date(date: &PrecisionDate, unit: Unit, amount: Decimal) -> Option<PrecisionDate> {
    let shifted = shift_naive_date(date.date, unit, amount)?;
    Some(PrecisionDate::new(shifted, date.precision))
}

fn shift_naive_date(base: NaiveDate, unit: Unit, amount: Decimal) -> Option<NaiveDate> {
    match unit {
        Unit::Year => {
            let months = signed_count(amount) * 12;
            add_months(base, months)
        }
        Unit::Month => add_months(base, signed_count(amount)),
        Unit::Week => base.checked_add_signed(Duration::days(signed_count(amount) * 7)),
        Unit::Day => base.checked_add_signed(Duration::days(signed_count(amount))),
        Unit::Hour | Unit::Minute | Unit::Second | Unit::Millisecond => None,
    }
}

fn add_months(base: NaiveDate, months: i64) -> Option<NaiveDate> {
    if months >= 0 {
        base.checked_add_months(chrono::Months::new(months as u32))
    } else {
        base.checked_sub_months(chrono::Months::new((-months) as u32))
    }
}

fn shift_datetime(datetime: &PrecisionDateTime, unit: Unit, amount: Decimal) -> Option<PrecisionDateTime> {
    match unit {
        Unit::Year | Unit::Month | Unit::Week | Unit::Day => {
            let shifted = shift_naive_date(datetime.date, unit, amount)?;
            Some(PrecisionDateTime::new(shifted, datetime.time, datetime.offset, datetime.precision))
        }
        Unit::Hour => shift_by_nanos(datetime, signed_nanos(amount, 3_600_000_000_000)),
        Unit::Minute => shift_by_nanos(datetime, signed_nanos(amount, 60_000_000_000)),
        Unit::Second => shift_by_nanos(datetime, signed_nanos(amount, 1_000_000_000)),
        Unit::Millisecond => shift_by_nanos(datetime, signed_nanos(amount, 1_000_000)),
    }
}

fn shift_by_nanos(datetime: &PrecisionDateTime, nanos: i64) -> Option<PrecisionDateTime> {
    let naive = datetime.date.and_time(datetime.time) + Duration::nanoseconds(nanos);
    Some(PrecisionDateTime::new(naive.date(), naive.time(), datetime.offset, datetime.precision))
}

fn shift_time(time: &PrecisionTime, unit: Unit, amount: Decimal) -> Option<PrecisionTime> {
    let nanos = match unit {
        Unit::Hour => signed_nanos(amount, 3_600_000_000_000),
        Unit::Minute => signed_nanos(amount, 60_000_000_000),
        Unit::Second => signed_nanos(amount, 1_000_000_000),
        Unit::Millisecond => signed_nanos(amount, 1_000_000),
        Unit::Year | Unit::Month | Unit::Week | Unit::Day => return None,
    };
    let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let shifted = (base.and_time(time.time) + Duration::nanoseconds(nanos)).time();
    Some(PrecisionTime::new(shifted, time.precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::temporal::TemporalPrecision;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32, precision: TemporalPrecision) -> Value {
        Value::Date(PrecisionDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), precision))
    }

    #[test]
    fn adding_days_rolls_into_next_month() {
        let result = eval_temporal_arithmetic(
            BinaryOperator::Add,
            &date(2024, 1, 30, TemporalPrecision::Day),
            &Value::quantity(Quantity::new(dec!(3), "d")),
        )
        .unwrap()
        .unwrap();
        assert_eq!(result, date(2024, 2, 2, TemporalPrecision::Day));
    }

    #[test]
    fn subtracting_a_year_preserves_precision() {
        let result = eval_temporal_arithmetic(
            BinaryOperator::Subtract,
            &date(2024, 6, 1, TemporalPrecision::Year),
            &Value::quantity(Quantity::new(dec!(1), "year")),
        )
        .unwrap()
        .unwrap();
        assert_eq!(result, date(2023, 6, 1, TemporalPrecision::Year));
    }

    #[test]
    fn hours_on_a_bare_date_is_empty() {
        let result = eval_temporal_arithmetic(
            BinaryOperator::Add,
            &date(2024, 1, 1, TemporalPrecision::Day),
            &Value::quantity(Quantity::new(dec!(1), "h")),
        )
        .unwrap();
        assert_eq!(result, None);
    }
}
