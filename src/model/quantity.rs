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

//! The Quantity system type: a decimal value paired with a UCUM unit.

use crate::ucum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// `(decimal value, unit string)`, per spec.md §4.1. `unit` is always the
/// surface text — `"1"` for dimensionless, a UCUM code, or a calendar
/// duration keyword normalized to its UCUM equivalent by [`Quantity::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: String,
}

impl Quantity {
    /// Build a quantity, normalizing a bare calendar-duration keyword
    /// (`"year"`, `"days"`, ...) to its UCUM code so later comparisons
    /// don't need to special-case the keyword form.
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        let normalized = ucum::calendar_keyword_to_ucum(&unit)
            .map(str::to_string)
            .unwrap_or(unit);
        Self {
            value,
            unit: normalized,
        }
    }

    /// A dimensionless quantity (`'1'`).
    pub fn dimensionless(value: Decimal) -> Self {
        Self {
            value,
            unit: "1".to_string(),
        }
    }

    fn canonical(&self) -> Option<(Decimal, ucum::UnitExpr)> {
        let parsed = ucum::parse(&self.unit).ok()?;
        let (scalar, base) = ucum::canonicalize(&parsed).ok()?;
        Some((self.value * scalar, base))
    }

    /// spec.md §4.6: canonicalize both to base units; if the base units
    /// differ, equality is undecidable (`None`), never `Some(false)`.
    pub fn equals(&self, other: &Self) -> Option<bool> {
        let (va, ua) = self.canonical()?;
        let (vb, ub) = other.canonical()?;
        if ua != ub {
            return None;
        }
        Some(va == vb)
    }

    /// spec.md §4.6: equivalence never returns empty; an incompatible unit
    /// pair is simply not equivalent.
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self.canonical(), other.canonical()) {
            (Some((va, ua)), Some((vb, ub))) => ua == ub && va == vb,
            _ => false,
        }
    }

    /// spec.md §4.7: ordering requires the same canonical unit; anything
    /// else is undecidable.
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        let (va, ua) = self.canonical()?;
        let (vb, ub) = other.canonical()?;
        if ua != ub {
            return None;
        }
        va.partial_cmp(&vb)
    }

    /// Quantity × Quantity: values multiply, units combine via UCUM
    /// exponent algebra (spec.md §4.5/§4.9).
    pub fn multiply(&self, other: &Self) -> crate::error::Result<Self> {
        let a = ucum::parse(&self.unit)
            .map_err(|e| crate::error::FhirPathError::type_error(e.to_string()))?;
        let b = ucum::parse(&other.unit)
            .map_err(|e| crate::error::FhirPathError::type_error(e.to_string()))?;
        Ok(Self {
            value: self.value * other.value,
            unit: a.multiply(&b).format(),
        })
    }

    /// Re-express this quantity in `target_unit`, when the two units share
    /// the same canonical base (used by `toQuantity(unit)`).
    pub fn convert_to(&self, target_unit: &str) -> Option<Self> {
        let (self_scalar, self_base) = self.canonical()?;
        let target = Self::new(Decimal::ONE, target_unit);
        let (target_scalar, target_base) = target.canonical()?;
        if self_base != target_base {
            return None;
        }
        Some(Self {
            value: self_scalar / target_scalar,
            unit: target.unit,
        })
    }

    /// Quantity ÷ Quantity: values divide, units subtract exponents.
    /// Returns `None` for a zero divisor, matching spec.md §4.5's
    /// "zero divisor → empty".
    pub fn divide(&self, other: &Self) -> crate::error::Result<Option<Self>> {
        if other.value.is_zero() {
            return Ok(None);
        }
        let a = ucum::parse(&self.unit)
            .map_err(|e| crate::error::FhirPathError::type_error(e.to_string()))?;
        let b = ucum::parse(&other.unit)
            .map_err(|e| crate::error::FhirPathError::type_error(e.to_string()))?;
        Ok(Some(Self {
            value: self.value / other.value,
            unit: a.divide(&b).format(),
        }))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn calendar_keyword_normalizes_to_ucum() {
        let q = Quantity::new(dec!(4), "days");
        assert_eq!(q.unit, "d");
    }

    #[test]
    fn equal_values_different_scales_are_equal() {
        let a = Quantity::new(dec!(1), "kg");
        let b = Quantity::new(dec!(1000), "g");
        assert_eq!(a.equals(&b), Some(true));
        assert!(a.equivalent(&b));
    }

    #[test]
    fn incompatible_units_are_undecidable_for_equality() {
        let a = Quantity::new(dec!(1), "kg");
        let b = Quantity::new(dec!(1), "s");
        assert_eq!(a.equals(&b), None);
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn multiply_combines_units() {
        let a = Quantity::new(dec!(2.5), "kg");
        let b = Quantity::new(dec!(3), "m");
        let product = a.multiply(&b).unwrap();
        assert_eq!(product.value, dec!(7.5));
        assert_eq!(product.unit, "kg.m");
    }

    #[test]
    fn divide_by_zero_is_empty() {
        let a = Quantity::new(dec!(4), "m");
        let zero = Quantity::new(dec!(0), "s");
        assert_eq!(a.divide(&zero).unwrap(), None);
    }

    #[test]
    fn comparison_requires_matching_canonical_unit() {
        let a = Quantity::new(dec!(1), "h");
        let b = Quantity::new(dec!(61), "min");
        assert_eq!(a.partial_compare(&b), Some(Ordering::Less));

        let c = Quantity::new(dec!(1), "kg");
        assert_eq!(a.partial_compare(&c), None);
    }
}
