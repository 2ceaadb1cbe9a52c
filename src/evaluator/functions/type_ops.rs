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

//! `ofType(T)` and `type()` (spec.md §4.4, Type group). The infix `is`/`as`
//! operators live in `evaluator::operators::typeop`; both functions here
//! reuse that module's exact-runtime-type test rather than duplicating it.
//!
//! `type()` has no dedicated variant in [`Value`] to carry a type tag, so
//! it reports each item's [`FhirPathType`] wrapped the same way a FHIR
//! complex value would be: a [`FhirNode`] whose `namespace`/`name` fields
//! are readable through ordinary property access.

use crate::evaluator::operators::eval_is;
use crate::model::{Collection, FhirNode, Value};
use serde_json::json;
use std::sync::Arc;

/// `receiver.ofType(T)`: keep only items whose *actual* runtime type is
/// exactly `T`, collection-in/collection-out (not a singleton operation).
pub fn of_type(receiver: &Collection, namespace: Option<&str>, name: &str) -> Collection {
    receiver.iter().filter(|item| eval_is(item, namespace, name)).cloned().collect()
}

/// `receiver.type()`: one `TypeInfo`-shaped node per item, reflecting its
/// namespace and name (spec.md §4.1).
pub fn type_of(receiver: &Collection) -> Collection {
    receiver
        .iter()
        .map(|item| {
            let t = item.type_of();
            Value::Node(FhirNode::new(
                Arc::new(json!({"namespace": t.namespace, "name": t.name})),
                "TypeInfo",
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_type_keeps_only_exact_matches() {
        let c: Collection = vec![Value::Integer(1), Value::string("x"), Value::Integer(2)].into_iter().collect();
        assert_eq!(of_type(&c, None, "Integer").len(), 2);
    }

    #[test]
    fn type_of_reports_namespace_and_name() {
        let c = Collection::singleton(Value::Boolean(true));
        let result = type_of(&c);
        match result.as_singleton() {
            Some(Value::Node(node)) => {
                assert_eq!(node.json["namespace"], "System");
                assert_eq!(node.json["name"], "Boolean");
            }
            _ => panic!("expected a TypeInfo node"),
        }
    }
}
