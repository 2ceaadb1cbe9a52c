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

//! `empty exists(no-arg) allTrue anyTrue allFalse anyFalse subsetOf
//! supersetOf count distinct isDistinct` (spec.md §4.4, Existence group).
//!
//! `exists(criteria)` and `all(criteria)` take an expression argument and
//! are evaluator-resident (they re-evaluate the AST per element); the
//! no-argument forms used when the caller omits a filter live here.

use crate::evaluator::operators::eval_in;
use crate::model::{Collection, Value};

pub fn is_empty(receiver: &Collection) -> bool {
    receiver.is_empty()
}

pub fn exists_no_filter(receiver: &Collection) -> bool {
    !receiver.is_empty()
}

pub fn count(receiver: &Collection) -> i64 {
    receiver.len() as i64
}

pub fn distinct(receiver: &Collection) -> Collection {
    let mut out = Collection::empty();
    for item in receiver.iter() {
        let seen: Collection = out.iter().cloned().collect();
        if eval_in(item, &seen) != Some(true) {
            out.push(item.clone());
        }
    }
    out
}

pub fn is_distinct(receiver: &Collection) -> bool {
    distinct(receiver).len() == receiver.len()
}

fn all_bool<F: Fn(bool) -> bool>(receiver: &Collection, predicate: F) -> bool {
    receiver.iter().all(|v| matches!(v, Value::Boolean(b) if predicate(*b)))
}

fn any_bool<F: Fn(bool) -> bool>(receiver: &Collection, predicate: F) -> bool {
    receiver.iter().any(|v| matches!(v, Value::Boolean(b) if predicate(*b)))
}

pub fn all_true(receiver: &Collection) -> bool {
    all_bool(receiver, |b| b)
}

pub fn any_true(receiver: &Collection) -> bool {
    any_bool(receiver, |b| b)
}

pub fn all_false(receiver: &Collection) -> bool {
    all_bool(receiver, |b| !b)
}

pub fn any_false(receiver: &Collection) -> bool {
    any_bool(receiver, |b| !b)
}

pub fn subset_of(receiver: &Collection, other: &Collection) -> bool {
    receiver.iter().all(|item| eval_in(item, other).unwrap_or(false))
}

pub fn superset_of(receiver: &Collection, other: &Collection) -> bool {
    subset_of(other, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_drops_equal_duplicates() {
        let c: Collection = vec![Value::Integer(1), Value::Integer(1), Value::Integer(2)]
            .into_iter()
            .collect();
        assert_eq!(distinct(&c).len(), 2);
    }

    #[test]
    fn all_true_is_vacuously_true_on_empty() {
        assert!(all_true(&Collection::empty()));
    }

    #[test]
    fn subset_of_checks_membership() {
        let a: Collection = vec![Value::Integer(1)].into_iter().collect();
        let b: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        assert!(subset_of(&a, &b));
        assert!(!subset_of(&b, &a));
    }
}
