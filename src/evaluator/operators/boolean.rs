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

//! `and or xor implies` three-valued truth tables (spec.md §4.2).
//!
//! `None` stands for the empty collection, not a boolean value. Every table
//! here is evaluated only for its *non-short-circuiting* combinations — the
//! evaluator dispatcher short-circuits `and`/`or`/`implies` before reaching
//! these functions whenever the left operand already determines the result.

/// `and`: false dominates, otherwise empty propagates, otherwise both true.
pub fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// `or`: true dominates, otherwise empty propagates, otherwise both false.
pub fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// `xor`: defined whenever both operands are known, undecidable otherwise.
pub fn xor(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a != b),
        _ => None,
    }
}

/// `implies`: `false implies anything` is true; otherwise behaves like a
/// material conditional gated on both operands being known, except that a
/// known-true antecedent with an empty consequent stays empty while a known
/// antecedent paired with a true consequent is already true regardless of
/// the antecedent's truth.
pub fn implies(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) => Some(true),
        (_, Some(true)) => Some(true),
        (Some(true), Some(false)) => Some(false),
        (Some(true), None) => None,
        (None, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_truth_table() {
        assert_eq!(and(Some(true), Some(true)), Some(true));
        assert_eq!(and(Some(true), Some(false)), Some(false));
        assert_eq!(and(Some(false), None), Some(false));
        assert_eq!(and(Some(true), None), None);
        assert_eq!(and(None, None), None);
    }

    #[test]
    fn or_truth_table() {
        assert_eq!(or(Some(false), Some(false)), Some(false));
        assert_eq!(or(Some(true), None), Some(true));
        assert_eq!(or(Some(false), None), None);
        assert_eq!(or(None, None), None);
    }

    #[test]
    fn xor_requires_both_operands_known() {
        assert_eq!(xor(Some(true), Some(false)), Some(true));
        assert_eq!(xor(Some(true), Some(true)), Some(false));
        assert_eq!(xor(Some(true), None), None);
    }

    #[test]
    fn implies_short_circuits_on_false_antecedent() {
        assert_eq!(implies(Some(false), None), Some(true));
        assert_eq!(implies(None, Some(true)), Some(true));
        assert_eq!(implies(Some(true), Some(false)), Some(false));
        assert_eq!(implies(Some(true), None), None);
        assert_eq!(implies(None, None), None);
    }
}
