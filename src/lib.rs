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

//! A FHIRPath expression language evaluator for FHIR resources.
//!
//! ```
//! use fhirpath::FhirPathEngine;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let mut engine = FhirPathEngine::r4();
//! let result = engine
//!     .evaluate("Patient.name.given", json!({"resourceType": "Patient"}), HashMap::new())
//!     .unwrap();
//! assert!(result.is_empty());
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod ucum;

pub use engine::{Engine, FhirPathEngine};
pub use error::{FhirPathError, Result};
pub use model::{Collection, FhirPathType, FhirVersion, ModelProvider, Value};
pub use parser::parse;
