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

//! Data model and value types for FHIRPath expressions: the runtime value
//! representation, the type system, and the model navigator that bridges
//! the two over an input FHIR resource graph.

pub mod provider;
pub mod quantity;
pub mod temporal;
pub mod types;
pub mod value;

pub use provider::{GenericJsonProvider, ModelProvider};
pub use quantity::Quantity;
pub use temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision};
pub use types::{FhirPathType, FhirVersion};
pub use value::{Collection, FhirNode, Value};
