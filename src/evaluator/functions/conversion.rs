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

//! `toBoolean toInteger toDate toDateTime toDecimal toQuantity toString
//! toTime` and their `convertsTo…` twins (spec.md §4.4, Conversion group).

use super::require_singleton;
use crate::error::Result;
use crate::model::temporal::TemporalPrecision;
use crate::model::{Collection, PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity, Value};
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(-(\d{2})(-(\d{2}))?)?$").unwrap());
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T?(\d{2})(:(\d{2})(:(\d{2})(\.(\d+))?)?)?$").unwrap());
static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(-(\d{2})(-(\d{2})(T(\d{2})(:(\d{2})(:(\d{2})(\.(\d+))?)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$")
        .unwrap()
});
static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(-?\d+(\.\d+)?)\s*'?([^']*)'?\s*$").unwrap());

pub(crate) fn parse_date_text(text: &str) -> Option<PrecisionDate> {
    let caps = DATE_RE.captures(text)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    if let Some(month) = caps.get(3) {
        let month: u32 = month.as_str().parse().ok()?;
        if let Some(day) = caps.get(5) {
            let day: u32 = day.as_str().parse().ok()?;
            Some(PrecisionDate::new(NaiveDate::from_ymd_opt(year, month, day)?, TemporalPrecision::Day))
        } else {
            Some(PrecisionDate::new(NaiveDate::from_ymd_opt(year, month, 1)?, TemporalPrecision::Month))
        }
    } else {
        Some(PrecisionDate::new(NaiveDate::from_ymd_opt(year, 1, 1)?, TemporalPrecision::Year))
    }
}

pub(crate) fn parse_time_text(text: &str) -> Option<PrecisionTime> {
    let caps = TIME_RE.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(3).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let second: u32 = caps.get(5).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let millis: u32 = caps
        .get(7)
        .map(|m| format!("{:0<3}", &m.as_str()[..m.as_str().len().min(3)]).parse().unwrap_or(0))
        .unwrap_or(0);
    let precision = if caps.get(7).is_some() {
        TemporalPrecision::Millisecond
    } else if caps.get(5).is_some() {
        TemporalPrecision::Second
    } else if caps.get(3).is_some() {
        TemporalPrecision::Minute
    } else {
        TemporalPrecision::Hour
    };
    Some(PrecisionTime::new(NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?, precision))
}

pub(crate) fn parse_datetime_text(text: &str) -> Option<PrecisionDateTime> {
    let caps = DATETIME_RE.captures(text)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(3).map(|m| m.as_str().parse().unwrap_or(1)).unwrap_or(1);
    let day: u32 = caps.get(5).map(|m| m.as_str().parse().unwrap_or(1)).unwrap_or(1);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    if caps.get(6).is_none() {
        let precision = if caps.get(5).is_some() {
            TemporalPrecision::Day
        } else if caps.get(3).is_some() {
            TemporalPrecision::Month
        } else {
            TemporalPrecision::Year
        };
        return Some(PrecisionDateTime::new(date, NaiveTime::from_hms_opt(0, 0, 0)?, None, precision));
    }

    let hour: u32 = caps.get(7)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(9).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let second: u32 = caps.get(11).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
    let millis: u32 = caps
        .get(13)
        .map(|m| format!("{:0<3}", &m.as_str()[..m.as_str().len().min(3)]).parse().unwrap_or(0))
        .unwrap_or(0);
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    let precision = if caps.get(13).is_some() {
        TemporalPrecision::Millisecond
    } else if caps.get(11).is_some() {
        TemporalPrecision::Second
    } else if caps.get(9).is_some() {
        TemporalPrecision::Minute
    } else {
        TemporalPrecision::Hour
    };
    let offset = match caps.get(14).map(|m| m.as_str()) {
        Some("Z") => Some(chrono::FixedOffset::east_opt(0)?),
        Some(text) => {
            let sign = if text.starts_with('-') { -1 } else { 1 };
            let h: i32 = text[1..3].parse().ok()?;
            let m: i32 = text[4..6].parse().ok()?;
            Some(chrono::FixedOffset::east_opt(sign * (h * 3600 + m * 60))?)
        }
        None => None,
    };
    Some(PrecisionDateTime::new(date, time, offset, precision))
}

pub(crate) fn parse_quantity_text(text: &str) -> Option<Quantity> {
    let caps = QUANTITY_RE.captures(text)?;
    let value = Decimal::from_str(caps.get(1)?.as_str()).ok()?;
    let parsed_unit = caps.get(3).map(|m| m.as_str()).filter(|u| !u.is_empty()).unwrap_or("1");
    Some(Quantity::new(value, parsed_unit))
}

fn string_to_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

pub fn to_boolean(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toBoolean")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Boolean(b) => Some(*b),
        Value::Integer(1) => Some(true),
        Value::Integer(0) => Some(false),
        Value::Decimal(d) if *d == Decimal::ONE => Some(true),
        Value::Decimal(d) if d.is_zero() => Some(false),
        Value::String(s) => string_to_bool(s),
        _ => None,
    };
    Ok(result.map(Value::Boolean).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_boolean(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_boolean)
}

pub fn to_integer(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toInteger")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Integer(i) => Some(*i),
        Value::Boolean(b) => Some(if *b { 1 } else { 0 }),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        Value::Decimal(d) if d.fract().is_zero() => d.to_i32(),
        _ => None,
    };
    Ok(result.map(Value::Integer).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_integer(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_integer)
}

pub fn to_decimal(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toDecimal")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Decimal(d) => Some(*d),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Long(l) => Some(Decimal::from(*l)),
        Value::Boolean(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    Ok(result.map(Value::Decimal).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_decimal(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_decimal)
}

pub fn to_date(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toDate")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Date(d) => Some(d.clone()),
        Value::DateTime(dt) => Some(PrecisionDate::new(dt.date, dt.precision.min(TemporalPrecision::Day))),
        Value::String(s) => parse_date_text(s),
        _ => None,
    };
    Ok(result.map(Value::Date).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_date(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_date)
}

pub fn to_date_time(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toDateTime")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::DateTime(dt) => Some(dt.clone()),
        Value::Date(d) => Some(PrecisionDateTime::new(d.date, NaiveTime::from_hms_opt(0, 0, 0).unwrap(), None, d.precision)),
        Value::String(s) => parse_datetime_text(s),
        _ => None,
    };
    Ok(result.map(Value::DateTime).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_date_time(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_date_time)
}

pub fn to_time(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toTime")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Time(t) => Some(t.clone()),
        Value::String(s) => parse_time_text(s),
        _ => None,
    };
    Ok(result.map(Value::Time).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_time(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_time)
}

pub fn to_string(receiver: &Collection) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toString")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::string(value.to_string())))
}

pub fn converts_to_string(receiver: &Collection) -> Result<Collection> {
    wraps_conversion(receiver, to_string)
}

pub fn to_quantity(receiver: &Collection, unit: Option<&str>) -> Result<Collection> {
    let Some(value) = require_singleton(receiver, "toQuantity")? else {
        return Ok(Collection::empty());
    };
    let result = match value {
        Value::Quantity(q) => match unit {
            Some(target) => q.convert_to(target),
            None => Some((**q).clone()),
        },
        Value::Integer(i) => Some(Quantity::new(Decimal::from(*i), unit.unwrap_or("1"))),
        Value::Long(l) => Some(Quantity::new(Decimal::from(*l), unit.unwrap_or("1"))),
        Value::Decimal(d) => Some(Quantity::new(*d, unit.unwrap_or("1"))),
        Value::String(s) => parse_quantity_text(s),
        _ => None,
    };
    Ok(result.map(Value::quantity).map(Collection::singleton).unwrap_or_default())
}

pub fn converts_to_quantity(receiver: &Collection, unit: Option<&str>) -> Result<Collection> {
    let converted = to_quantity(receiver, unit)?;
    if receiver.is_empty() {
        return Ok(Collection::empty());
    }
    Ok(Collection::singleton(Value::Boolean(!converted.is_empty())))
}

fn wraps_conversion(receiver: &Collection, convert: impl Fn(&Collection) -> Result<Collection>) -> Result<Collection> {
    if receiver.is_empty() {
        return Ok(Collection::empty());
    }
    let converted = convert(receiver)?;
    Ok(Collection::singleton(Value::Boolean(!converted.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_converts_to_boolean_literal_variants() {
        let c = Collection::singleton(Value::string("YES"));
        assert_eq!(to_boolean(&c).unwrap(), Collection::singleton(Value::Boolean(true)));
    }

    #[test]
    fn unparseable_boolean_string_is_empty() {
        let c = Collection::singleton(Value::string("maybe"));
        assert!(to_boolean(&c).unwrap().is_empty());
    }

    #[test]
    fn string_parses_into_date() {
        let c = Collection::singleton(Value::string("2024-03"));
        let result = to_date(&c).unwrap();
        match result.as_singleton() {
            Some(Value::Date(d)) => assert_eq!(d.precision, TemporalPrecision::Month),
            _ => panic!("expected a Date"),
        }
    }

    #[test]
    fn string_parses_into_quantity_with_quoted_unit() {
        let c = Collection::singleton(Value::string("5 'mg'"));
        let result = to_quantity(&c, None).unwrap();
        match result.as_singleton() {
            Some(Value::Quantity(q)) => assert_eq!(q.unit, "mg"),
            _ => panic!("expected a Quantity"),
        }
    }

    #[test]
    fn converts_to_integer_reports_without_changing_receiver() {
        let c = Collection::singleton(Value::string("abc"));
        assert_eq!(converts_to_integer(&c).unwrap(), Collection::singleton(Value::Boolean(false)));
    }
}
