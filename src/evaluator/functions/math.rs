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

//! `abs ceiling floor truncate round sqrt ln log exp power` (spec.md §4.4,
//! Math group). Decimal mode keeps 15 digits of precision and rounds
//! half-away-from-zero; a result that isn't a real number (e.g. `sqrt` of
//! a negative) becomes empty rather than an error.

use super::require_singleton;
use crate::error::{FhirPathError, Result};
use crate::evaluator::operators::Numeric;
use crate::model::{Collection, Value};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

const DECIMAL_PRECISION: u32 = 15;

fn receiver_numeric(receiver: &Collection, fn_name: &str) -> Result<Option<Numeric>> {
    match require_singleton(receiver, fn_name)? {
        None => Ok(None),
        Some(value) => Numeric::from_value(value)
            .map(Some)
            .ok_or_else(|| FhirPathError::type_error(format!("{fn_name} requires a numeric receiver"))),
    }
}

fn integer_preserving(n: Numeric, f: impl Fn(Decimal) -> Decimal) -> Value {
    match n {
        Numeric::Integer(i) => {
            let result = f(Decimal::from(i));
            result.try_into().map(Value::Integer).unwrap_or(Value::Decimal(result))
        }
        Numeric::Long(l) => {
            let result = f(Decimal::from(l));
            result.try_into().map(Value::Long).unwrap_or(Value::Decimal(result))
        }
        Numeric::Decimal(d) => Value::Decimal(f(d)),
    }
}

pub fn abs(receiver: &Collection) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "abs")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(integer_preserving(n, |d| d.abs())))
}

pub fn ceiling(receiver: &Collection) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "ceiling")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(integer_preserving(n, |d| d.ceil())))
}

pub fn floor(receiver: &Collection) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "floor")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(integer_preserving(n, |d| d.floor())))
}

pub fn truncate(receiver: &Collection) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "truncate")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(integer_preserving(n, |d| d.trunc())))
}

pub fn round(receiver: &Collection, precision: u32) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "round")? else {
        return Ok(Collection::empty());
    };
    let rounded = n.as_decimal().round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    Ok(Collection::singleton(match n {
        Numeric::Integer(_) | Numeric::Long(_) if precision == 0 => {
            rounded.try_into().map(Value::Integer).unwrap_or(Value::Decimal(rounded))
        }
        _ => Value::Decimal(rounded),
    }))
}

fn real_valued(receiver: &Collection, fn_name: &str, f: impl Fn(Decimal) -> Option<Decimal>) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, fn_name)? else {
        return Ok(Collection::empty());
    };
    let value = n.as_decimal().round_dp(DECIMAL_PRECISION);
    Ok(f(value).map(Value::Decimal).map(Collection::singleton).unwrap_or_default())
}

pub fn sqrt(receiver: &Collection) -> Result<Collection> {
    real_valued(receiver, "sqrt", |d| d.sqrt())
}

pub fn ln(receiver: &Collection) -> Result<Collection> {
    real_valued(receiver, "ln", |d| if d > Decimal::ZERO { d.ln().into() } else { None })
}

pub fn log(receiver: &Collection, base: Decimal) -> Result<Collection> {
    if base <= Decimal::ZERO || base == Decimal::ONE {
        return Ok(Collection::empty());
    }
    real_valued(receiver, "log", |d| {
        if d > Decimal::ZERO { Some(d.ln() / base.ln()) } else { None }
    })
}

pub fn exp(receiver: &Collection) -> Result<Collection> {
    real_valued(receiver, "exp", |d| Some(d.exp()))
}

pub fn power(receiver: &Collection, exponent: Decimal) -> Result<Collection> {
    let Some(n) = receiver_numeric(receiver, "power")? else {
        return Ok(Collection::empty());
    };
    let base = n.as_decimal();
    if base < Decimal::ZERO && exponent.fract() != Decimal::ZERO {
        return Ok(Collection::empty());
    }
    let result = base.powd(exponent);
    Ok(Collection::singleton(match n {
        Numeric::Integer(_) | Numeric::Long(_) if exponent.fract().is_zero() && exponent >= Decimal::ZERO => {
            result.try_into().map(Value::Integer).unwrap_or(Value::Decimal(result))
        }
        _ => Value::Decimal(result),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn abs_preserves_integer_type() {
        let c = Collection::singleton(Value::Integer(-4));
        assert_eq!(abs(&c).unwrap(), Collection::singleton(Value::Integer(4)));
    }

    #[test]
    fn sqrt_of_negative_is_empty() {
        let c = Collection::singleton(Value::Decimal(dec!(-1)));
        assert!(sqrt(&c).unwrap().is_empty());
    }

    #[test]
    fn round_uses_half_away_from_zero() {
        let c = Collection::singleton(Value::Decimal(dec!(2.5)));
        assert_eq!(round(&c, 0).unwrap(), Collection::singleton(Value::Decimal(dec!(3))));
    }

    #[test]
    fn power_with_fractional_exponent_on_negative_base_is_empty() {
        let c = Collection::singleton(Value::Decimal(dec!(-4)));
        assert!(power(&c, dec!(0.5)).unwrap().is_empty());
    }
}
