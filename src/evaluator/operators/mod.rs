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

//! Binary and unary operator semantics (spec.md §4.5–§4.9).

mod arithmetic;
mod boolean;
mod comparison;
mod equality;
mod membership;
mod temporal_arith;
mod typeop;

pub use arithmetic::eval_arithmetic;
pub use boolean::{and, implies, or, xor};
pub use comparison::eval_comparison;
pub use equality::{collections_equal, collections_equivalent};
pub use membership::{eval_contains, eval_in};
pub use temporal_arith::eval_temporal_arithmetic;
pub use typeop::{eval_as, eval_is};

use crate::model::Value;
use rust_decimal::Decimal;

/// A numeric value widened to the common type two operands promote to,
/// per the conversion lattice (spec.md §4.1): Integer → Long → Decimal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
}

impl Numeric {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(Self::Integer(*i)),
            Value::Long(l) => Some(Self::Long(*l)),
            Value::Decimal(d) => Some(Self::Decimal(*d)),
            _ => None,
        }
    }

    pub fn as_decimal(self) -> Decimal {
        match self {
            Self::Integer(i) => Decimal::from(i),
            Self::Long(l) => Decimal::from(l),
            Self::Decimal(d) => d,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Integer(i) => Value::Integer(i),
            Self::Long(l) => Value::Long(l),
            Self::Decimal(d) => Value::Decimal(d),
        }
    }
}

/// Promote two numeric values to their shared representation: both
/// Integer stay Integer; any Long widens both to Long; any Decimal widens
/// both to Decimal.
pub fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
    use Numeric::*;
    match (a, b) {
        (Decimal(_), _) | (_, Decimal(_)) => (Decimal(a.as_decimal()), Decimal(b.as_decimal())),
        (Long(_), _) | (_, Long(_)) => (
            Long(match a {
                Integer(i) => i as i64,
                Long(l) => l,
                Decimal(_) => unreachable!(),
            }),
            Long(match b {
                Integer(i) => i as i64,
                Long(l) => l,
                Decimal(_) => unreachable!(),
            }),
        ),
        (Integer(x), Integer(y)) => (Integer(x), Integer(y)),
    }
}
