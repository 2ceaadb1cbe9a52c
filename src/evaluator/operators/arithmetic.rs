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

//! `+ - * / div mod &` (spec.md §4.5).

use super::temporal_arith::eval_temporal_arithmetic;
use super::{Numeric, promote};
use crate::ast::BinaryOperator;
use crate::error::{FhirPathError, Result};
use crate::model::{Quantity, Value};
use rust_decimal::Decimal;

/// Evaluate a singleton arithmetic application. `None` means the result is
/// the empty collection (e.g. division by zero), not a type error.
pub fn eval_arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<Option<Value>> {
    match op {
        BinaryOperator::Concat => return Ok(Some(concat(left, right))),
        _ => {}
    }

    if matches!(left, Value::Date(_) | Value::DateTime(_) | Value::Time(_))
        || matches!(right, Value::Date(_) | Value::DateTime(_) | Value::Time(_))
    {
        return eval_temporal_arithmetic(op, left, right);
    }

    match (op, left, right) {
        (BinaryOperator::Add, Value::String(a), Value::String(b)) => {
            Ok(Some(Value::string(format!("{a}{b}"))))
        }
        (BinaryOperator::Add, Value::Quantity(a), Value::Quantity(b)) => {
            quantity_add_subtract(a, b, true)
        }
        (BinaryOperator::Subtract, Value::Quantity(a), Value::Quantity(b)) => {
            quantity_add_subtract(a, b, false)
        }
        (BinaryOperator::Multiply, Value::Quantity(a), Value::Quantity(b)) => {
            Ok(Some(Value::quantity(a.multiply(b)?)))
        }
        (BinaryOperator::Divide, Value::Quantity(a), Value::Quantity(b)) => {
            Ok(a.divide(b)?.map(Value::quantity))
        }
        (BinaryOperator::Multiply, Value::Quantity(q), numeric) | (BinaryOperator::Multiply, numeric, Value::Quantity(q)) => {
            let n = Numeric::from_value(numeric)
                .ok_or_else(|| FhirPathError::type_error("quantity multiply expects a numeric operand"))?;
            Ok(Some(Value::quantity(Quantity::new(q.value * n.as_decimal(), q.unit.clone()))))
        }
        (BinaryOperator::Divide, Value::Quantity(q), numeric) => {
            let n = Numeric::from_value(numeric)
                .ok_or_else(|| FhirPathError::type_error("quantity divide expects a numeric operand"))?;
            if n.as_decimal().is_zero() {
                Ok(None)
            } else {
                Ok(Some(Value::quantity(Quantity::new(q.value / n.as_decimal(), q.unit.clone()))))
            }
        }
        (BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply, _, _) => {
            numeric_op(op, left, right)
        }
        (BinaryOperator::Divide, _, _) => divide(left, right),
        (BinaryOperator::Div, _, _) => int_div(left, right),
        (BinaryOperator::Mod, _, _) => int_mod(left, right),
        _ => Err(FhirPathError::type_error(format!(
            "operator {} is not defined for {} and {}",
            op.as_str(),
            left.type_of(),
            right.type_of()
        ))),
    }
}

fn concat(left: &Value, right: &Value) -> Value {
    let a = match left {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    };
    let b = match right {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    };
    Value::string(format!("{a}{b}"))
}

fn numeric_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Option<Value>> {
    let (Some(a), Some(b)) = (Numeric::from_value(left), Numeric::from_value(right)) else {
        return Err(FhirPathError::type_error(format!(
            "operator {} is not defined for {} and {}",
            op.as_str(),
            left.type_of(),
            right.type_of()
        )));
    };
    let (a, b) = promote(a, b);
    let result = match (op, a, b) {
        (BinaryOperator::Add, Numeric::Integer(x), Numeric::Integer(y)) => Numeric::Integer(x + y),
        (BinaryOperator::Subtract, Numeric::Integer(x), Numeric::Integer(y)) => Numeric::Integer(x - y),
        (BinaryOperator::Multiply, Numeric::Integer(x), Numeric::Integer(y)) => Numeric::Integer(x * y),
        (BinaryOperator::Add, Numeric::Long(x), Numeric::Long(y)) => Numeric::Long(x + y),
        (BinaryOperator::Subtract, Numeric::Long(x), Numeric::Long(y)) => Numeric::Long(x - y),
        (BinaryOperator::Multiply, Numeric::Long(x), Numeric::Long(y)) => Numeric::Long(x * y),
        (BinaryOperator::Add, Numeric::Decimal(x), Numeric::Decimal(y)) => Numeric::Decimal(x + y),
        (BinaryOperator::Subtract, Numeric::Decimal(x), Numeric::Decimal(y)) => Numeric::Decimal(x - y),
        (BinaryOperator::Multiply, Numeric::Decimal(x), Numeric::Decimal(y)) => Numeric::Decimal(x * y),
        _ => unreachable!("promote() always returns matching variants"),
    };
    Ok(Some(result.into_value()))
}

fn divide(left: &Value, right: &Value) -> Result<Option<Value>> {
    let (Some(a), Some(b)) = (Numeric::from_value(left), Numeric::from_value(right)) else {
        return Err(FhirPathError::type_error("'/' requires numeric operands"));
    };
    let divisor = b.as_decimal();
    if divisor.is_zero() {
        return Ok(None);
    }
    Ok(Some(Value::Decimal(a.as_decimal() / divisor)))
}

fn int_div(left: &Value, right: &Value) -> Result<Option<Value>> {
    let (Some(a), Some(b)) = (Numeric::from_value(left), Numeric::from_value(right)) else {
        return Err(FhirPathError::type_error("'div' requires numeric operands"));
    };
    let divisor = b.as_decimal();
    if divisor.is_zero() {
        return Ok(None);
    }
    let quotient = (a.as_decimal() / divisor).trunc();
    match (a, b) {
        (Numeric::Decimal(_), _) | (_, Numeric::Decimal(_)) => Ok(Some(Value::Decimal(quotient))),
        (Numeric::Long(_), _) | (_, Numeric::Long(_)) => Ok(Some(Value::Long(
            quotient.to_string().parse::<i64>().unwrap_or(0),
        ))),
        _ => Ok(Some(Value::Integer(
            quotient.to_string().parse::<i64>().unwrap_or(0) as i32,
        ))),
    }
}

fn int_mod(left: &Value, right: &Value) -> Result<Option<Value>> {
    let (Some(a), Some(b)) = (Numeric::from_value(left), Numeric::from_value(right)) else {
        return Err(FhirPathError::type_error("'mod' requires numeric operands"));
    };
    let divisor = b.as_decimal();
    if divisor.is_zero() {
        return Ok(None);
    }
    let remainder = a.as_decimal() % divisor;
    match (a, b) {
        (Numeric::Decimal(_), _) | (_, Numeric::Decimal(_)) => Ok(Some(Value::Decimal(remainder))),
        (Numeric::Long(_), _) | (_, Numeric::Long(_)) => Ok(Some(Value::Long(
            remainder.to_string().parse::<i64>().unwrap_or(0),
        ))),
        _ => Ok(Some(Value::Integer(
            remainder.to_string().parse::<i64>().unwrap_or(0) as i32,
        ))),
    }
}

fn quantity_add_subtract(a: &Quantity, b: &Quantity, add: bool) -> Result<Option<Value>> {
    let Some(cmp_unit) = crate::ucum::parse(&a.unit).ok().zip(crate::ucum::parse(&b.unit).ok()) else {
        return Err(FhirPathError::type_error("invalid UCUM unit in quantity arithmetic"));
    };
    let (ua, ub) = cmp_unit;
    let (scalar_a, base_a) = crate::ucum::canonicalize(&ua).map_err(|e| FhirPathError::type_error(e.to_string()))?;
    let (scalar_b, base_b) = crate::ucum::canonicalize(&ub).map_err(|e| FhirPathError::type_error(e.to_string()))?;
    if base_a != base_b {
        return Err(FhirPathError::type_error(format!(
            "cannot add/subtract quantities with incompatible units '{}' and '{}'",
            a.unit, b.unit
        )));
    }
    let base_value = if add {
        a.value * scalar_a + b.value * scalar_b
    } else {
        a.value * scalar_a - b.value * scalar_b
    };
    let result_value: Decimal = if scalar_a.is_zero() { base_value } else { base_value / scalar_a };
    Ok(Some(Value::quantity(Quantity::new(result_value, a.unit.clone()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn integer_plus_integer_stays_integer() {
        let result = eval_arithmetic(BinaryOperator::Add, &Value::Integer(1), &Value::Integer(2)).unwrap();
        assert_eq!(result, Some(Value::Integer(3)));
    }

    #[test]
    fn integer_plus_decimal_promotes() {
        let result =
            eval_arithmetic(BinaryOperator::Add, &Value::Integer(1), &Value::Decimal(dec!(0.5))).unwrap();
        assert_eq!(result, Some(Value::Decimal(dec!(1.5))));
    }

    #[test]
    fn division_by_zero_is_empty() {
        let result = eval_arithmetic(BinaryOperator::Divide, &Value::Integer(1), &Value::Integer(0)).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn division_always_yields_decimal() {
        let result = eval_arithmetic(BinaryOperator::Divide, &Value::Integer(4), &Value::Integer(2)).unwrap();
        assert_eq!(result, Some(Value::Decimal(dec!(2))));
    }

    #[test]
    fn string_concat_with_plus() {
        let result =
            eval_arithmetic(BinaryOperator::Add, &Value::string("a"), &Value::string("b")).unwrap();
        assert_eq!(result, Some(Value::string("ab")));
    }

    #[test]
    fn ampersand_treats_missing_as_empty_string() {
        let result = eval_arithmetic(BinaryOperator::Concat, &Value::string("a"), &Value::Integer(1)).unwrap();
        assert_eq!(result, Some(Value::string("a1")));
    }

    #[test]
    fn long_div_long_stays_long() {
        let result = eval_arithmetic(BinaryOperator::Div, &Value::Long(7), &Value::Long(2)).unwrap();
        assert_eq!(result, Some(Value::Long(3)));
    }

    #[test]
    fn long_mod_long_stays_long() {
        let result = eval_arithmetic(BinaryOperator::Mod, &Value::Long(7), &Value::Long(2)).unwrap();
        assert_eq!(result, Some(Value::Long(1)));
    }

    #[test]
    fn long_div_preserves_magnitude_beyond_i32_range() {
        let huge = Value::Long(10_000_000_000);
        let result = eval_arithmetic(BinaryOperator::Div, &huge, &Value::Long(1)).unwrap();
        assert_eq!(result, Some(Value::Long(10_000_000_000)));
    }

    #[test]
    fn integer_div_long_promotes_to_long() {
        let result = eval_arithmetic(BinaryOperator::Div, &Value::Integer(7), &Value::Long(2)).unwrap();
        assert_eq!(result, Some(Value::Long(3)));
    }

    #[test]
    fn quantity_multiply_combines_units() {
        let a = Value::quantity(Quantity::new(dec!(2), "kg"));
        let b = Value::quantity(Quantity::new(dec!(3), "m"));
        let result = eval_arithmetic(BinaryOperator::Multiply, &a, &b).unwrap().unwrap();
        match result {
            Value::Quantity(q) => {
                assert_eq!(q.value, dec!(6));
                assert_eq!(q.unit, "kg.m");
            }
            _ => panic!("expected Quantity"),
        }
    }
}
