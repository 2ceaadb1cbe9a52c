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

//! The evaluator's runtime value and collection types (spec.md §3).

use super::quantity::Quantity;
use super::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use super::types::FhirPathType;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// A FHIR-typed node carried by reference from the input model, tagged with
/// the type name the model navigator resolved it to (needed for `type()`,
/// `is`, and `as` without re-walking the navigator).
#[derive(Debug, Clone, PartialEq)]
pub struct FhirNode {
    pub json: Arc<serde_json::Value>,
    pub type_name: Arc<str>,
}

impl FhirNode {
    pub fn new(json: Arc<serde_json::Value>, type_name: impl Into<Arc<str>>) -> Self {
        Self {
            json,
            type_name: type_name.into(),
        }
    }
}

/// A single evaluator value: either a system-typed primitive or a
/// FHIR-typed node. Every [`Collection`] is a sequence of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    /// 32-bit signed integer, per spec.md §3.
    Integer(i32),
    /// 64-bit signed integer — distinct from `Integer`, not reused as its
    /// storage, per spec.md §3's explicit Integer/Long split.
    Long(i64),
    Decimal(Decimal),
    String(Arc<str>),
    Date(PrecisionDate),
    DateTime(PrecisionDateTime),
    Time(PrecisionTime),
    Quantity(Arc<Quantity>),
    Node(FhirNode),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn quantity(q: Quantity) -> Self {
        Self::Quantity(Arc::new(q))
    }

    /// The FHIRPath type tag for this value (spec.md §4.1's reflection
    /// mapping). `Node` delegates to whatever type name the model
    /// navigator resolved at construction time.
    pub fn type_of(&self) -> FhirPathType {
        match self {
            Self::Boolean(_) => FhirPathType::system("Boolean"),
            Self::Integer(_) => FhirPathType::system("Integer"),
            Self::Long(_) => FhirPathType::system("Long"),
            Self::Decimal(_) => FhirPathType::system("Decimal"),
            Self::String(_) => FhirPathType::system("String"),
            Self::Date(_) => FhirPathType::system("Date"),
            Self::DateTime(_) => FhirPathType::system("DateTime"),
            Self::Time(_) => FhirPathType::system("Time"),
            Self::Quantity(_) => FhirPathType::system("Quantity"),
            Self::Node(node) => FhirPathType::fhir(node.type_name.to_string()),
        }
    }

    /// True/false/empty per spec.md §4.2's three-valued logic: non-Boolean
    /// values are not automatically truthy, so callers combine this with
    /// cardinality checks rather than relying on it alone.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Node(n) => write!(f, "{}", n.json),
        }
    }
}

/// An ordered sequence of values with no deduplication unless an operator
/// demands it (spec.md §3). The empty collection is the universal "no
/// value"; a one-element collection stands in for a scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection(SmallVec<[Value; 1]>);

impl Collection {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn singleton(value: Value) -> Self {
        Self(SmallVec::from_buf([value]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, other: Collection) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// The single contained value, or `None` if empty or multi-item — the
    /// caller decides whether "not a singleton" is an error or an empty
    /// result per the function it's implementing.
    pub fn as_singleton(&self) -> Option<&Value> {
        if self.0.len() == 1 { self.0.first() } else { None }
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0.into_vec()
    }
}

impl From<Value> for Collection {
    fn from(value: Value) -> Self {
        Self::singleton(value)
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_round_trips() {
        let c = Collection::singleton(Value::Integer(42));
        assert_eq!(c.len(), 1);
        assert_eq!(c.as_singleton(), Some(&Value::Integer(42)));
    }

    #[test]
    fn empty_has_no_singleton() {
        let c = Collection::empty();
        assert!(c.is_empty());
        assert_eq!(c.as_singleton(), None);
    }

    #[test]
    fn multi_item_is_not_a_singleton() {
        let c: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        assert_eq!(c.as_singleton(), None);
    }

    #[test]
    fn type_of_distinguishes_integer_and_long() {
        assert_eq!(Value::Integer(1).type_of().name, "Integer");
        assert_eq!(Value::Long(1).type_of().name, "Long");
    }
}
