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

//! The FHIRPath type system: type tags, FHIR version binding, and the
//! implicit conversion lattice (spec.md §4.1).

use std::fmt;

/// The FHIR major version a `FHIR`-namespaced type is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FhirVersion {
    R4,
    R4B,
    R5,
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R4 => write!(f, "R4"),
            Self::R4B => write!(f, "R4B"),
            Self::R5 => write!(f, "R5"),
        }
    }
}

/// A FHIRPath type tag: `(namespace, name)` per spec.md §4.1. Every value
/// maps to exactly one of these via reflection (`type()`, `is`, `as`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirPathType {
    pub namespace: &'static str,
    pub name: String,
}

impl FhirPathType {
    pub fn system(name: &str) -> Self {
        Self {
            namespace: "System",
            name: name.to_string(),
        }
    }

    pub fn fhir(name: impl Into<String>) -> Self {
        Self {
            namespace: "FHIR",
            name: name.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.namespace == "System"
    }
}

impl fmt::Display for FhirPathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// One step in the implicit conversion lattice (spec.md §4.1): "a value of
/// `from` can stand in for `to` wherever `to` is expected".
fn direct_edge(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("Integer", "Long")
            | ("Long", "Decimal")
            | ("Decimal", "Quantity")
            | ("Date", "DateTime")
    )
}

/// True if `from` converts to `to` through zero or more lattice edges,
/// including `from == to`. The lattice is unidirectional and transitively
/// closed: Integer → Long → Decimal → Quantity, Date → DateTime.
pub fn converts_to(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    let chain = ["Integer", "Long", "Decimal", "Quantity"];
    if let (Some(fi), Some(ti)) = (chain.iter().position(|s| *s == from), chain.iter().position(|s| *s == to)) {
        return fi <= ti;
    }
    direct_edge(from, to)
}

/// Map a FHIR primitive type name to its corresponding System type, per
/// spec.md §4.1's "FHIR primitive types → corresponding System primitive".
pub fn fhir_primitive_to_system(fhir_type: &str) -> Option<&'static str> {
    Some(match fhir_type {
        "boolean" => "Boolean",
        "integer" | "unsignedInt" | "positiveInt" => "Integer",
        "decimal" => "Decimal",
        "string" | "code" | "uri" | "url" | "canonical" | "oid" | "uuid" | "id" | "markdown"
        | "base64Binary" | "xhtml" => "String",
        "date" => "Date",
        "dateTime" | "instant" => "DateTime",
        "time" => "Time",
        "Quantity" => "Quantity",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_is_transitive() {
        assert!(converts_to("Integer", "Quantity"));
        assert!(converts_to("Integer", "Long"));
        assert!(!converts_to("Quantity", "Integer"));
        assert!(!converts_to("Decimal", "Date"));
    }

    #[test]
    fn date_converts_to_datetime_only() {
        assert!(converts_to("Date", "DateTime"));
        assert!(!converts_to("DateTime", "Date"));
    }

    #[test]
    fn fhir_primitive_mapping() {
        assert_eq!(fhir_primitive_to_system("positiveInt"), Some("Integer"));
        assert_eq!(fhir_primitive_to_system("dateTime"), Some("DateTime"));
        assert_eq!(fhir_primitive_to_system("Patient"), None);
    }

    #[test]
    fn display_format() {
        assert_eq!(FhirPathType::system("Boolean").to_string(), "System.Boolean");
        assert_eq!(FhirPathType::fhir("Patient").to_string(), "FHIR.Patient");
    }
}
