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

//! UCUM unit engine.
//!
//! Implements spec.md §4.9 directly: parsing a UCUM unit string into a
//! multiset of `unit -> exponent`, canonicalizing that multiset to base
//! units with an accumulated scalar factor, and the multiply/divide/format
//! operations quantity arithmetic needs.
//!
//! This is not a full UCUM registry — it covers the SI prefixes, the seven
//! base units, and the derived/clinical units spec.md names or implies
//! (time, pressure, volume, percent, arbitrary units). Unknown codes are a
//! hard error rather than a silent guess, per spec.md's "fatal" policy for
//! anything the engine can't decide.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors the UCUM engine can raise while parsing or canonicalizing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UcumError {
    /// The unit string was not well-formed component syntax.
    #[error("invalid UCUM unit syntax: '{0}'")]
    Syntax(String),
    /// The same unit code appeared twice in one parse.
    #[error("duplicate unit '{0}' in UCUM expression")]
    DuplicateUnit(String),
    /// A unit code is not in this engine's table.
    #[error("unknown UCUM unit '{0}'")]
    UnknownUnit(String),
}

type UcumResult<T> = Result<T, UcumError>;

/// A parsed (or canonicalized) unit expression: a multiset of unit code to
/// signed integer exponent, with zero exponents always filtered out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitExpr {
    terms: BTreeMap<String, i32>,
}

impl UnitExpr {
    /// The dimensionless unit (`'1'`).
    pub fn dimensionless() -> Self {
        Self {
            terms: BTreeMap::new(),
        }
    }

    /// True if this expression has no remaining unit terms.
    pub fn is_dimensionless(&self) -> bool {
        self.terms.is_empty()
    }

    /// Multiply two unit expressions: add exponents, drop zeros.
    pub fn multiply(&self, other: &Self) -> Self {
        Self::combine(self, other, 1)
    }

    /// Divide two unit expressions: subtract exponents, drop zeros.
    pub fn divide(&self, other: &Self) -> Self {
        Self::combine(self, other, -1)
    }

    /// Raise every exponent in this expression to the given power.
    pub fn pow(&self, n: i32) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|(k, v)| (k.clone(), v * n))
            .filter(|(_, v)| *v != 0)
            .collect();
        Self { terms }
    }

    fn combine(a: &Self, b: &Self, sign: i32) -> Self {
        let mut terms = a.terms.clone();
        for (code, exp) in &b.terms {
            let entry = terms.entry(code.clone()).or_insert(0);
            *entry += exp * sign;
        }
        terms.retain(|_, v| *v != 0);
        Self { terms }
    }

    /// Render as bare component text (no surrounding quotes): unit codes
    /// sorted lexicographically, joined with `.`, exponent `1` omitted,
    /// dimensionless renders as `1`.
    pub fn format(&self) -> String {
        if self.terms.is_empty() {
            return "1".to_string();
        }
        self.terms
            .iter()
            .map(|(code, exp)| {
                if *exp == 1 {
                    code.clone()
                } else {
                    format!("{code}{exp}")
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Parse a bare (unquoted) UCUM unit string into its surface multiset.
pub fn parse(input: &str) -> UcumResult<UnitExpr> {
    if input == "1" {
        return Ok(UnitExpr::dimensionless());
    }
    let mut terms: BTreeMap<String, i32> = BTreeMap::new();
    let mut denominator = false;
    let mut start = 0usize;

    let mut push = |tok: &str, denom: bool, terms: &mut BTreeMap<String, i32>| -> UcumResult<()> {
        if tok.is_empty() {
            return Err(UcumError::Syntax(input.to_string()));
        }
        let (code, exp) = split_exponent(tok);
        if code.is_empty() {
            return Err(UcumError::Syntax(input.to_string()));
        }
        if terms.contains_key(code) {
            return Err(UcumError::DuplicateUnit(code.to_string()));
        }
        let signed = if denom { -exp } else { exp };
        if signed != 0 {
            terms.insert(code.to_string(), signed);
        }
        Ok(())
    };

    for (i, ch) in input.char_indices() {
        if ch == '.' || ch == '/' {
            push(&input[start..i], denominator, &mut terms)?;
            if ch == '/' {
                denominator = true;
            }
            start = i + ch.len_utf8();
        }
    }
    push(&input[start..], denominator, &mut terms)?;

    Ok(UnitExpr { terms })
}

/// Split a trailing signed integer exponent off a component token.
/// `"m2"` -> (`"m"`, 2); `"s-2"` -> (`"s"`, -2); `"kg"` -> (`"kg"`, 1).
fn split_exponent(tok: &str) -> (&str, i32) {
    let bytes = tok.as_bytes();
    let mut i = bytes.len();
    while i > 0 && bytes[i - 1].is_ascii_digit() {
        i -= 1;
    }
    if i > 0 && i < bytes.len() && bytes[i - 1] == b'-' {
        i -= 1;
    }
    if i == tok.len() {
        return (tok, 1);
    }
    let exp = tok[i..].parse().unwrap_or(1);
    (&tok[..i], exp)
}

/// Canonicalize a parsed unit expression to base units, returning the
/// accumulated scalar factor alongside the base-unit-only expression.
pub fn canonicalize(expr: &UnitExpr) -> UcumResult<(Decimal, UnitExpr)> {
    let mut scalar = Decimal::ONE;
    let mut base: BTreeMap<String, i32> = BTreeMap::new();
    for (code, exp) in &expr.terms {
        let (unit_scalar, unit_base) = resolve_symbol(code)?;
        scalar *= pow_decimal(unit_scalar, *exp);
        for (bcode, bexp) in unit_base {
            let entry = base.entry(bcode.to_string()).or_insert(0);
            *entry += bexp * exp;
        }
    }
    base.retain(|_, v| *v != 0);
    Ok((scalar, UnitExpr { terms: base }))
}

/// True if two surface unit strings canonicalize to the same base dimension.
pub fn is_comparable(a: &str, b: &str) -> bool {
    match (parse(a).and_then(|e| canonicalize(&e)), parse(b).and_then(|e| canonicalize(&e))) {
        (Ok((_, ba)), Ok((_, bb))) => ba == bb,
        _ => false,
    }
}

fn pow_decimal(base: Decimal, exp: i32) -> Decimal {
    if exp == 0 {
        return Decimal::ONE;
    }
    let positive = exp.unsigned_abs();
    let mut result = Decimal::ONE;
    for _ in 0..positive {
        result *= base;
    }
    if exp < 0 { Decimal::ONE / result } else { result }
}

/// A single unit table entry: its scalar multiple of the base dimension and
/// the base-unit exponents it expands to.
struct UnitDef {
    scalar: Decimal,
    base: &'static [(&'static str, i32)],
}

/// Units that accept an SI prefix (`"kg"`, `"cm"`, `"mmol"`, ...). The bare
/// symbol itself is also a valid, unprefixed unit.
fn prefixable_base(code: &str) -> Option<UnitDef> {
    Some(match code {
        "m" => UnitDef { scalar: Decimal::ONE, base: &[("m", 1)] },
        "g" => UnitDef { scalar: Decimal::ONE, base: &[("g", 1)] },
        "s" => UnitDef { scalar: Decimal::ONE, base: &[("s", 1)] },
        "rad" => UnitDef { scalar: Decimal::ONE, base: &[("rad", 1)] },
        "K" => UnitDef { scalar: Decimal::ONE, base: &[("K", 1)] },
        "C" => UnitDef { scalar: Decimal::ONE, base: &[("C", 1)] },
        "cd" => UnitDef { scalar: Decimal::ONE, base: &[("cd", 1)] },
        "mol" => UnitDef { scalar: Decimal::ONE, base: &[("mol", 1)] },
        "L" => UnitDef { scalar: Decimal::new(1, 3), base: &[("m", 3)] },
        "Hz" => UnitDef { scalar: Decimal::ONE, base: &[("s", -1)] },
        "N" => UnitDef { scalar: Decimal::new(1000, 0), base: &[("g", 1), ("m", 1), ("s", -2)] },
        "Pa" => UnitDef { scalar: Decimal::new(1000, 0), base: &[("g", 1), ("m", -1), ("s", -2)] },
        "J" => UnitDef { scalar: Decimal::new(1000, 0), base: &[("g", 1), ("m", 2), ("s", -2)] },
        "W" => UnitDef { scalar: Decimal::new(1000, 0), base: &[("g", 1), ("m", 2), ("s", -3)] },
        _ => return None,
    })
}

/// Units that never take a prefix: calendar-duration definite units,
/// percent, arbitrary units, and a couple of named clinical units.
fn atomic_unit(code: &str) -> Option<UnitDef> {
    Some(match code {
        "min" => UnitDef { scalar: Decimal::new(60, 0), base: &[("s", 1)] },
        "h" => UnitDef { scalar: Decimal::new(3600, 0), base: &[("s", 1)] },
        "d" => UnitDef { scalar: Decimal::new(86400, 0), base: &[("s", 1)] },
        "wk" => UnitDef { scalar: Decimal::new(604_800, 0), base: &[("s", 1)] },
        "mo" => UnitDef { scalar: Decimal::new(2_629_800, 0), base: &[("s", 1)] },
        "a" => UnitDef { scalar: Decimal::new(31_557_600, 0), base: &[("s", 1)] },
        "%" => UnitDef { scalar: Decimal::new(1, 2), base: &[] },
        "[iU]" => UnitDef { scalar: Decimal::ONE, base: &[("[iU]", 1)] },
        // Celsius is canonicalized as a 1:1 scale of Kelvin, ignoring the
        // +273.15 offset: sufficient for matching units across quantities
        // that are already expressed in the same scale, not for converting
        // absolute temperatures between Cel and K.
        "Cel" => UnitDef { scalar: Decimal::ONE, base: &[("K", 1)] },
        // mmHg is not decomposed via the "m" prefix (UCUM's actual rule);
        // it is treated as one atomic pressure unit for this engine's scope.
        "mm[Hg]" => UnitDef {
            scalar: Decimal::new(133_322_387_415i64, 6),
            base: &[("g", 1), ("m", -1), ("s", -2)],
        },
        _ => return None,
    })
}

const PREFIXES: &[(&str, i32)] = &[
    ("da", 1),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("u", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("k", 3),
    ("h", 2),
    ("M", 6),
    ("G", 9),
    ("T", 12),
];

fn ten_pow(exp: i32) -> Decimal {
    pow_decimal(Decimal::TEN, exp)
}

fn resolve_symbol(code: &str) -> UcumResult<(Decimal, Vec<(&'static str, i32)>)> {
    if let Some(def) = atomic_unit(code) {
        return Ok((def.scalar, def.base.to_vec()));
    }
    if let Some(def) = prefixable_base(code) {
        return Ok((def.scalar, def.base.to_vec()));
    }
    // Longest-prefix-first so "da" is preferred over "d" where both match.
    let mut prefixes: Vec<&(&str, i32)> = PREFIXES.iter().collect();
    prefixes.sort_by_key(|(p, _)| std::cmp::Reverse(p.len()));
    for (prefix, exp) in prefixes {
        if let Some(rest) = code.strip_prefix(prefix) {
            if let Some(def) = prefixable_base(rest) {
                return Ok((ten_pow(*exp) * def.scalar, def.base.to_vec()));
            }
        }
    }
    Err(UcumError::UnknownUnit(code.to_string()))
}

/// Map a FHIRPath calendar-duration keyword (singular or plural) to its
/// definite UCUM unit code, per spec.md §4.9.
pub fn calendar_keyword_to_ucum(word: &str) -> Option<&'static str> {
    Some(match word {
        "year" | "years" => "a",
        "month" | "months" => "mo",
        "week" | "weeks" => "wk",
        "day" | "days" => "d",
        "hour" | "hours" => "h",
        "minute" | "minutes" => "min",
        "second" | "seconds" => "s",
        "millisecond" | "milliseconds" => "ms",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensionless() {
        assert!(parse("1").unwrap().is_dimensionless());
    }

    #[test]
    fn parses_compound_unit() {
        let u = parse("kg.m/s2").unwrap();
        assert_eq!(u.format(), "kg.m.s-2");
    }

    #[test]
    fn rejects_duplicate_unit() {
        assert_eq!(parse("m.m"), Err(UcumError::DuplicateUnit("m".to_string())));
    }

    #[test]
    fn format_round_trips_through_parse() {
        for s in ["1", "kg", "m.s-1", "kg.m.s-2", "mg/mL"] {
            let parsed = parse(s).unwrap();
            let reparsed = parse(&parsed.format()).unwrap();
            assert_eq!(parsed, reparsed, "round-trip failed for {s}");
        }
    }

    #[test]
    fn multiply_and_divide_are_inverses() {
        let a = parse("kg.m").unwrap();
        let b = parse("s2").unwrap();
        let product = a.multiply(&b);
        let back = product.divide(&b);
        assert_eq!(back, a);
    }

    #[test]
    fn canonicalizes_kg_to_grams() {
        let (scalar, base) = canonicalize(&parse("kg").unwrap()).unwrap();
        assert_eq!(scalar, Decimal::new(1000, 0));
        assert_eq!(base, parse("g").unwrap());
    }

    #[test]
    fn calendar_units_are_comparable_in_seconds() {
        assert!(is_comparable("h", "min"));
        assert!(is_comparable("d", "wk"));
        assert!(!is_comparable("d", "kg"));
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert_eq!(
            canonicalize(&parse("xyzzy").unwrap()),
            Err(UcumError::UnknownUnit("xyzzy".to_string()))
        );
    }
}
