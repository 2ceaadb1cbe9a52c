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

//! End-to-end scenarios evaluating full expression text against a FHIR
//! resource through the public [`fhirpath::FhirPathEngine`] facade.

use fhirpath::{Collection, FhirPathEngine, Value};
use serde_json::json;
use std::collections::HashMap;

fn eval(expr: &str, resource: serde_json::Value) -> Collection {
    FhirPathEngine::r4().evaluate(expr, resource, HashMap::new()).unwrap()
}

fn eval_empty(expr: &str) -> Collection {
    eval(expr, json!({"resourceType": "Resource"}))
}

#[test]
fn sct_resolves_to_the_snomed_url() {
    assert_eq!(eval_empty("%sct"), Collection::singleton(Value::string("http://snomed.info/sct")));
}

#[test]
fn quoted_value_set_token_resolves_to_the_hl7_url() {
    let result = eval_empty("%'vs-administrative-gender'");
    assert_eq!(
        result,
        Collection::singleton(Value::string("http://hl7.org/fhir/ValueSet/administrative-gender"))
    );
}

#[test]
fn union_deduplicates_then_counts() {
    let result = eval_empty("(1 | 2 | 2 | 3).count()");
    assert_eq!(result, Collection::singleton(Value::Integer(3)));
}

#[test]
fn substring_extracts_the_requested_span() {
    let result = eval_empty("'hello'.substring(1, 3)");
    assert_eq!(result, Collection::singleton(Value::string("ell")));
}

#[test]
fn quantity_multiplication_combines_units_and_multiplies_values() {
    let result = eval_empty("2.5 'kg' * 3 'm'");
    match result.as_singleton() {
        Some(Value::Quantity(q)) => {
            assert_eq!(q.value, rust_decimal::Decimal::new(75, 1));
            assert!(q.unit.contains("kg") && q.unit.contains('m'));
        }
        other => panic!("expected a Quantity, got {other:?}"),
    }
}

#[test]
fn month_precision_dates_compare_decidably() {
    assert_eq!(eval_empty("@2024-01 < @2024-02"), Collection::singleton(Value::Boolean(true)));
}

#[test]
fn mismatched_precision_comparison_is_undecidable() {
    assert!(eval_empty("@2024 < @2024-02").is_empty());
}

#[test]
fn member_path_flattens_repeating_elements() {
    let resource = json!({
        "resourceType": "Patient",
        "name": [{"given": ["Ada", "K."]}],
    });
    let result = eval("Patient.name.given", resource);
    let strings: Vec<String> = result.iter().map(|v| v.to_string()).collect();
    assert_eq!(strings, vec!["Ada".to_string(), "K.".to_string()]);
}

#[test]
fn equality_between_two_empty_collections_is_empty() {
    assert!(eval_empty("{} = {}").is_empty());
}

#[test]
fn iif_short_circuits_the_untaken_branch() {
    assert_eq!(eval_empty("iif(true, 'a', 1/0)"), Collection::singleton(Value::string("a")));
}

#[test]
fn lenient_access_on_a_missing_field_is_empty_not_an_error() {
    let resource = json!({"resourceType": "Patient"});
    assert!(eval("Patient.nonExistentField", resource).is_empty());
}

#[test]
fn empty_absorbs_arithmetic_on_either_side() {
    assert!(eval_empty("1 + {}").is_empty());
    assert!(eval_empty("{} + 1").is_empty());
}

#[test]
fn trailing_tokens_after_a_valid_prefix_are_a_parse_error() {
    let err = fhirpath::parse("1 + 2)").unwrap_err();
    assert!(matches!(err, fhirpath::FhirPathError::Parse { .. }));
}

#[test]
fn three_valued_and_with_unknown_left_operand() {
    let resource = json!({"resourceType": "Patient"});
    // `Patient.missing` is empty; `and` with a `true` right side stays undecidable.
    assert!(eval("Patient.missing and true", resource).is_empty());
}

#[test]
fn where_filters_a_repeating_element_by_predicate() {
    let resource = json!({
        "resourceType": "Patient",
        "name": [
            {"use": "official", "family": "Lovelace"},
            {"use": "nickname", "family": "Ada"},
        ],
    });
    let result = eval("Patient.name.where(use = 'official').family", resource);
    assert_eq!(result, Collection::singleton(Value::string("Lovelace")));
}

#[test]
fn aggregate_computes_a_running_total_across_a_collection() {
    let resource = json!({
        "resourceType": "Observation",
        "component": [{"valueInteger": 1}, {"valueInteger": 2}, {"valueInteger": 3}],
    });
    let result = eval("Observation.component.valueInteger.aggregate($this + $total, 0)", resource);
    assert_eq!(result, Collection::singleton(Value::Integer(6)));
}

#[test]
fn to_quantity_round_trips_an_integer_value() {
    let result = eval_empty("5.toQuantity().value");
    assert_eq!(result, Collection::singleton(Value::Decimal(rust_decimal::Decimal::from(5))));
}

#[test]
fn of_type_keeps_only_items_of_the_requested_system_type() {
    let resource = json!({
        "resourceType": "Patient",
        "name": [{"given": ["Ada"]}],
        "active": true,
    });
    let result = eval("(Patient.active | Patient.name.given).ofType(Boolean)", resource);
    assert_eq!(result, Collection::singleton(Value::Boolean(true)));
}
