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

//! `union combine` (spec.md §4.4, Combining group).

use crate::evaluator::operators::eval_in;
use crate::model::Collection;

/// `a.union(b)` (also backs the infix `|` operator): concatenate then
/// deduplicate under FHIRPath equality.
pub fn union(left: &Collection, right: &Collection) -> Collection {
    let mut out = Collection::empty();
    for item in left.iter().chain(right.iter()) {
        let already: Collection = out.iter().cloned().collect();
        if eval_in(item, &already) != Some(true) {
            out.push(item.clone());
        }
    }
    out
}

/// `a.combine(b)`: plain concatenation, no deduplication.
pub fn combine(left: &Collection, right: &Collection) -> Collection {
    let mut out = left.clone();
    out.extend(right.clone());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn union_deduplicates() {
        let a: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        let b: Collection = vec![Value::Integer(2), Value::Integer(3)].into_iter().collect();
        assert_eq!(union(&a, &b).len(), 3);
    }

    #[test]
    fn combine_keeps_duplicates() {
        let a: Collection = vec![Value::Integer(1)].into_iter().collect();
        let b: Collection = vec![Value::Integer(1)].into_iter().collect();
        assert_eq!(combine(&a, &b).len(), 2);
    }
}
