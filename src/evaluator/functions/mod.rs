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

//! The non-evaluator-resident function library (spec.md §4.4). Higher-order
//! functions that re-evaluate an argument expression per element —
//! `where`, `select`, `repeat`, `all`, `exists`, `iif`, `aggregate` — live
//! in the tree-walking evaluator itself, not here, since a plain `fn` has
//! no AST to re-enter.

pub mod boundary;
pub mod combining;
pub mod conversion;
pub mod existence;
pub mod math;
pub mod string;
pub mod subsetting;
pub mod tree;
pub mod type_ops;
pub mod utility;

use crate::error::{FhirPathError, Result};
use crate::model::{Collection, Value};

/// The general cardinality rule every collection-in/scalar-out function in
/// this module follows (spec.md §4.4's intro): empty receiver yields
/// `Ok(None)` (the caller returns empty), a single item yields
/// `Ok(Some(item))`, and more than one item is a fatal cardinality error.
pub(super) fn require_singleton<'a>(receiver: &'a Collection, fn_name: &str) -> Result<Option<&'a Value>> {
    match receiver.len() {
        0 => Ok(None),
        1 => Ok(receiver.as_singleton()),
        n => Err(FhirPathError::cardinality(fn_name, n)),
    }
}
