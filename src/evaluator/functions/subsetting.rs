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

//! `single first last tail skip take intersect exclude` (spec.md §4.4,
//! Subsetting group).

use crate::error::{FhirPathError, Result};
use crate::evaluator::operators::eval_in;
use crate::model::Collection;

/// `single()`: the sole item, empty on an empty receiver, a fatal
/// cardinality error when more than one item is present.
pub fn single(receiver: &Collection) -> Result<Collection> {
    match receiver.len() {
        0 => Ok(Collection::empty()),
        1 => Ok(receiver.clone()),
        n => Err(FhirPathError::cardinality("single", n)),
    }
}

pub fn first(receiver: &Collection) -> Collection {
    receiver.iter().next().cloned().map(Collection::singleton).unwrap_or_default()
}

pub fn last(receiver: &Collection) -> Collection {
    receiver.iter().last().cloned().map(Collection::singleton).unwrap_or_default()
}

pub fn tail(receiver: &Collection) -> Collection {
    receiver.iter().skip(1).cloned().collect()
}

pub fn skip(receiver: &Collection, n: i64) -> Collection {
    if n <= 0 {
        return receiver.clone();
    }
    receiver.iter().skip(n as usize).cloned().collect()
}

pub fn take(receiver: &Collection, n: i64) -> Collection {
    if n <= 0 {
        return Collection::empty();
    }
    receiver.iter().take(n as usize).cloned().collect()
}

/// Set intersection, preserving the receiver's first-occurrence order.
pub fn intersect(receiver: &Collection, other: &Collection) -> Collection {
    let mut out = Collection::empty();
    for item in receiver.iter() {
        let already: Collection = out.iter().cloned().collect();
        if eval_in(item, other) == Some(true) && eval_in(item, &already) != Some(true) {
            out.push(item.clone());
        }
    }
    out
}

/// Remove every element of `other` from the receiver, by equality.
pub fn exclude(receiver: &Collection, other: &Collection) -> Collection {
    receiver
        .iter()
        .filter(|item| eval_in(item, other) != Some(true))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn collection(values: Vec<i32>) -> Collection {
        values.into_iter().map(Value::Integer).collect()
    }

    #[test]
    fn single_errors_on_multiple_items() {
        assert!(single(&collection(vec![1, 2])).is_err());
    }

    #[test]
    fn tail_skip_take() {
        let c = collection(vec![1, 2, 3, 4]);
        assert_eq!(tail(&c), collection(vec![2, 3, 4]));
        assert_eq!(skip(&c, 2), collection(vec![3, 4]));
        assert_eq!(take(&c, 2), collection(vec![1, 2]));
    }

    #[test]
    fn intersect_preserves_receiver_order() {
        let a = collection(vec![3, 1, 2]);
        let b = collection(vec![1, 3]);
        assert_eq!(intersect(&a, &b), collection(vec![3, 1]));
    }

    #[test]
    fn exclude_removes_matching_items() {
        let a = collection(vec![1, 2, 3]);
        let b = collection(vec![2]);
        assert_eq!(exclude(&a, &b), collection(vec![1, 3]));
    }
}
