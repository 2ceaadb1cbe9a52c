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

//! The model navigator: property lookup, child enumeration, choice-value
//! unwrap, and type-of-value resolution over the FHIR input graph
//! (spec.md §4.3). One implementation per FHIR version, as the spec calls
//! for, but all three share the same generic JSON walk — the differences
//! between R4/R4B/R5 that matter at this layer are confined to which
//! choice-type suffixes and primitive type names are recognized.

use super::types::FhirVersion;
use super::value::{Collection, FhirNode, Value};
use std::sync::Arc;

/// Property lookup, child enumeration, choice unwrap, and type resolution
/// over FHIR-typed nodes. Implementations never mutate the underlying
/// graph — every method borrows and returns new derived values.
pub trait ModelProvider: Send + Sync {
    /// True if `type_name` declares `property` (by name or choice base).
    fn has_property(&self, type_name: &str, property: &str) -> bool;

    /// The value(s) of `property` on `node`, or empty if absent — FHIRPath
    /// property access is always lenient (spec.md §8's "Lenient access").
    fn get_property(&self, node: &FhirNode, property: &str) -> Collection;

    /// Every direct child value of `node`, across all its properties, in
    /// declaration order as they appear in the underlying JSON object.
    fn all_children(&self, node: &FhirNode) -> Collection;

    /// For a choice element named by its FHIR base (e.g. `"value"` for
    /// `value[x]`), find whichever concrete suffixed key is present
    /// (`valueString`, `valueQuantity`, ...) and return its resolved type
    /// name and value.
    fn unwrap_choice(&self, node: &FhirNode, base_name: &str) -> Option<(String, Value)>;

    /// The FHIR type name of `node`, e.g. `"Patient"` or `"HumanName"`.
    fn type_of(&self, node: &FhirNode) -> String {
        node.type_name.to_string()
    }

    fn version(&self) -> FhirVersion;
}

/// FHIR primitive element names whose JSON representation is a bare JSON
/// scalar rather than an object — drives how `get_property` boxes a leaf.
fn primitive_system_type(fhir_type_hint: Option<&str>, json: &serde_json::Value) -> Option<&'static str> {
    if let Some(hint) = fhir_type_hint {
        if let Some(system) = super::types::fhir_primitive_to_system(hint) {
            return Some(system);
        }
    }
    match json {
        serde_json::Value::Bool(_) => Some("Boolean"),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some("Integer"),
        serde_json::Value::Number(_) => Some("Decimal"),
        serde_json::Value::String(_) => Some("String"),
        _ => None,
    }
}

fn json_scalar_to_value(json: &serde_json::Value, system_type: &str) -> Option<Value> {
    match (system_type, json) {
        ("Boolean", serde_json::Value::Bool(b)) => Some(Value::Boolean(*b)),
        ("Integer", serde_json::Value::Number(n)) => n.as_i64().map(|v| Value::Integer(v as i32)),
        ("Decimal", serde_json::Value::Number(n)) => {
            n.as_f64().and_then(|v| rust_decimal::Decimal::try_from(v).ok()).map(Value::Decimal)
        }
        (_, serde_json::Value::String(s)) => Some(Value::string(s.as_str())),
        _ => None,
    }
}

/// The suffixes a FHIR `[x]` choice element can end in. Not exhaustive of
/// every FHIR complex type, but covers every type actually used as a
/// choice target across the base resources.
const CHOICE_SUFFIXES: &[&str] = &[
    "Boolean", "Integer", "Decimal", "String", "Uri", "Url", "Canonical", "Code", "Date",
    "DateTime", "Time", "Instant", "Oid", "Uuid", "Id", "Markdown", "UnsignedInt", "PositiveInt",
    "Base64Binary", "Quantity", "CodeableConcept", "Coding", "Identifier", "Reference", "Period",
    "Range", "Ratio", "Attachment", "HumanName", "Address", "ContactPoint", "Annotation", "Money",
    "Age", "Duration", "Count", "Distance", "SampledData", "Signature", "Timing", "Meta",
    "Expression", "Dosage", "RelatedArtifact", "ContactDetail", "UsageContext",
];

/// A `ModelProvider` over raw `serde_json::Value` resources, with no
/// generated StructureDefinition model behind it — property existence and
/// typing are derived from the JSON shape itself plus the choice-suffix
/// table above, not validated against a schema (spec.md §1's "no FHIR
/// structure-definition loading" Non-goal).
#[derive(Debug, Clone)]
pub struct GenericJsonProvider {
    version: FhirVersion,
}

impl GenericJsonProvider {
    pub fn new(version: FhirVersion) -> Self {
        Self { version }
    }

    fn box_child(&self, key: &str, value: &serde_json::Value) -> Vec<Value> {
        match value {
            serde_json::Value::Array(items) => {
                items.iter().flat_map(|item| self.box_child(key, item)).collect()
            }
            serde_json::Value::Null => vec![],
            serde_json::Value::Object(_) => {
                vec![Value::Node(FhirNode::new(
                    Arc::new(value.clone()),
                    infer_complex_type_name(key),
                ))]
            }
            scalar => {
                let system_type = primitive_system_type(None, scalar).unwrap_or("String");
                json_scalar_to_value(scalar, system_type).into_iter().collect()
            }
        }
    }
}

/// Best-effort type name for a nested object with no schema backing it:
/// capitalize the property name, e.g. `"name"` -> `"Name"`. Real element
/// type names (`HumanName`, `CodeableConcept`, ...) are only recoverable
/// from a StructureDefinition, which this provider does not load.
fn infer_complex_type_name(property: &str) -> String {
    let mut chars = property.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl ModelProvider for GenericJsonProvider {
    fn has_property(&self, _type_name: &str, property: &str) -> bool {
        !property.is_empty()
    }

    fn get_property(&self, node: &FhirNode, property: &str) -> Collection {
        let serde_json::Value::Object(map) = node.json.as_ref() else {
            return Collection::empty();
        };
        if let Some(child) = map.get(property) {
            return self.box_child(property, child).into_iter().collect();
        }
        if let Some((_, value)) = self.unwrap_choice(node, property) {
            return Collection::singleton(value);
        }
        Collection::empty()
    }

    fn all_children(&self, node: &FhirNode) -> Collection {
        let serde_json::Value::Object(map) = node.json.as_ref() else {
            return Collection::empty();
        };
        map.iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .flat_map(|(key, value)| self.box_child(key, value))
            .collect()
    }

    fn unwrap_choice(&self, node: &FhirNode, base_name: &str) -> Option<(String, Value)> {
        let serde_json::Value::Object(map) = node.json.as_ref() else {
            return None;
        };
        for suffix in CHOICE_SUFFIXES {
            let key = format!("{base_name}{suffix}");
            if let Some(value) = map.get(&key) {
                let boxed = self.box_child(&key, value).into_iter().next()?;
                return Some((suffix.to_string(), boxed));
            }
        }
        None
    }

    fn version(&self) -> FhirVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(json: serde_json::Value) -> FhirNode {
        FhirNode::new(Arc::new(json), "Patient")
    }

    #[test]
    fn missing_property_is_empty() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let n = node(json!({"name": "irrelevant"}));
        assert!(provider.get_property(&n, "nonExistentField").is_empty());
    }

    #[test]
    fn array_property_flattens_into_collection() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let n = node(json!({"given": ["Ada", "K."]}));
        let result = provider.get_property(&n, "given");
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn choice_type_resolves_suffixed_key() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let n = node(json!({"valueString": "hello"}));
        let (suffix, value) = provider.unwrap_choice(&n, "value").unwrap();
        assert_eq!(suffix, "String");
        assert_eq!(value, Value::string("hello"));
    }

    #[test]
    fn nested_object_becomes_a_node() {
        let provider = GenericJsonProvider::new(FhirVersion::R4);
        let n = node(json!({"name": {"family": "Shepard"}}));
        let result = provider.get_property(&n, "name");
        match result.as_singleton() {
            Some(Value::Node(inner)) => assert_eq!(inner.type_name.as_ref(), "Name"),
            other => panic!("expected a Node, got {other:?}"),
        }
    }
}
