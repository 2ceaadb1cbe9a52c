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

//! `children descendants` (spec.md §4.4, Tree group). Both delegate to the
//! model navigator; `descendants` is `repeat(children())` run to a fixed
//! point, stopping as soon as a round contributes nothing new.

use crate::evaluator::operators::eval_in;
use crate::model::{Collection, ModelProvider, Value};

pub fn children(receiver: &Collection, provider: &dyn ModelProvider) -> Collection {
    let mut out = Collection::empty();
    for item in receiver.iter() {
        if let Value::Node(node) = item {
            out.extend(provider.all_children(node));
        }
    }
    out
}

pub fn descendants(receiver: &Collection, provider: &dyn ModelProvider) -> Collection {
    let mut result = Collection::empty();
    let mut frontier = children(receiver, provider);
    loop {
        let mut fresh = Collection::empty();
        for item in frontier.iter() {
            if eval_in(item, &result) != Some(true) {
                fresh.push(item.clone());
            }
        }
        if fresh.is_empty() {
            break;
        }
        result.extend(fresh.clone());
        frontier = children(&fresh, provider);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FhirVersion, GenericJsonProvider};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn children_delegates_to_provider() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let json = Arc::new(json!({"name": [{"given": ["Ann"]}]}));
        let node = Value::Node(crate::model::FhirNode::new(json, "Patient"));
        let receiver = Collection::singleton(node);
        let result = children(&receiver, &provider);
        assert!(!result.is_empty());
    }

    #[test]
    fn descendants_reaches_a_fixed_point() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let json = Arc::new(json!({"name": [{"given": ["Ann"]}]}));
        let node = Value::Node(crate::model::FhirNode::new(json, "Patient"));
        let receiver = Collection::singleton(node);
        let result = descendants(&receiver, &provider);
        assert!(result.len() >= children(&receiver, &provider).len());
    }
}
