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

//! `now today timeOfDay trace` (spec.md §4.4, Utility group). `now`,
//! `today`, and `timeOfDay` all read the evaluation-scoped timestamp
//! (spec.md §3's "State carried") rather than sampling the wall clock
//! themselves, so repeated calls within one evaluation agree.
//!
//! `iif` is short-circuiting and needs to skip evaluating its untaken
//! branch, so it lives in the tree-walking evaluator alongside the other
//! higher-order functions, not here.

use crate::model::temporal::TemporalPrecision;
use crate::model::{Collection, PrecisionDate, PrecisionDateTime, PrecisionTime, Value};
use chrono::{DateTime, FixedOffset};

pub fn now(at: DateTime<FixedOffset>) -> Collection {
    Collection::singleton(Value::DateTime(PrecisionDateTime::new(
        at.date_naive(),
        at.time(),
        Some(*at.offset()),
        TemporalPrecision::Millisecond,
    )))
}

pub fn today(at: DateTime<FixedOffset>) -> Collection {
    Collection::singleton(Value::Date(PrecisionDate::new(at.date_naive(), TemporalPrecision::Day)))
}

pub fn time_of_day(at: DateTime<FixedOffset>) -> Collection {
    Collection::singleton(Value::Time(PrecisionTime::new(at.time(), TemporalPrecision::Millisecond)))
}

/// `trace(name, expr?)`: logs `name` and the traced values at debug level
/// and passes the receiver through unchanged. The teacher's diagnostics
/// use the `log` crate throughout; this keeps that convention for the one
/// function whose entire job is emitting a side-channel message.
pub fn trace(receiver: &Collection, name: &str, projected: &Collection) -> Collection {
    if projected.is_empty() {
        log::debug!("trace({name}): {:?}", receiver.as_slice());
    } else {
        log::debug!("trace({name}): {:?}", projected.as_slice());
    }
    receiver.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-15T10:30:00.500Z").unwrap()
    }

    #[test]
    fn now_carries_offset_and_millisecond_precision() {
        let result = now(at());
        match result.as_singleton() {
            Some(Value::DateTime(dt)) => {
                assert!(dt.is_zoned());
                assert_eq!(dt.precision, TemporalPrecision::Millisecond);
            }
            _ => panic!("expected a DateTime"),
        }
    }

    #[test]
    fn today_truncates_to_the_date_component() {
        let result = today(at());
        assert_eq!(
            result,
            Collection::singleton(Value::Date(PrecisionDate::new(at().date_naive(), TemporalPrecision::Day)))
        );
    }

    #[test]
    fn trace_passes_the_receiver_through_unchanged() {
        let receiver = Collection::singleton(Value::Integer(7));
        let result = trace(&receiver, "checkpoint", &Collection::empty());
        assert_eq!(result, receiver);
    }
}
