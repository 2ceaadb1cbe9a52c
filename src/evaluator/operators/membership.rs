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

//! `in` and `contains` (spec.md §4.2), both built on element `=`.

use super::equality::value_equal;
use crate::model::{Collection, Value};

/// `item in collection`: true if any element is known-equal, false if every
/// element is known-unequal, empty if some comparisons are undecidable and
/// none is known-equal.
pub fn eval_in(item: &Value, collection: &Collection) -> Option<bool> {
    let mut undecidable = false;
    for candidate in collection.iter() {
        match value_equal(item, candidate) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => undecidable = true,
        }
    }
    if undecidable { None } else { Some(false) }
}

/// `collection contains item`, the mirror of [`eval_in`].
pub fn eval_contains(collection: &Collection, item: &Value) -> Option<bool> {
    eval_in(item, collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_found_in_collection() {
        let c: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        assert_eq!(eval_in(&Value::Integer(2), &c), Some(true));
    }

    #[test]
    fn item_absent_from_collection() {
        let c: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        assert_eq!(eval_in(&Value::Integer(3), &c), Some(false));
    }

    #[test]
    fn contains_mirrors_in() {
        let c: Collection = vec![Value::string("a")].into_iter().collect();
        assert_eq!(eval_contains(&c, &Value::string("a")), Some(true));
    }
}
