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

//! Error types for FHIRPath parsing and evaluation.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FhirPathError>;

/// The error kinds a FHIRPath evaluation can fail with.
///
/// Arithmetic overflow, NaN results, and comparison undecidability are
/// deliberately not errors here — they resolve to the empty collection
/// per the evaluator's three-valued semantics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FhirPathError {
    /// Malformed or partially-consumed expression text.
    #[error("parse error at position {position}: {message}")]
    Parse {
        /// Byte offset into the source expression where parsing failed.
        position: usize,
        /// Human-readable description, naming the offending token.
        message: String,
    },

    /// A function requiring a singleton receiver saw more than one item.
    #[error("{function} requires a single-item input, got {count} items")]
    Cardinality {
        /// Name of the function invoked with too many items.
        function: String,
        /// The number of items actually present.
        count: usize,
    },

    /// Arithmetic or comparison between kinds that cannot be reconciled.
    #[error("type error: {message}")]
    Type {
        /// Human-readable description of the mismatched types.
        message: String,
    },

    /// An unrecognized environment variable, function, or type name.
    #[error("unknown {kind}: {name}")]
    UnknownIdentifier {
        /// What sort of identifier was unrecognized ("function", "variable", "type").
        kind: &'static str,
        /// The identifier text itself.
        name: String,
    },

    /// A function is named in the grammar but not implemented by this engine.
    #[error("'{name}' is not implemented")]
    Unimplemented {
        /// Name of the unimplemented function or operator.
        name: String,
    },
}

impl FhirPathError {
    /// Build a [`FhirPathError::Parse`].
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Build a [`FhirPathError::Cardinality`].
    pub fn cardinality(function: impl Into<String>, count: usize) -> Self {
        Self::Cardinality {
            function: function.into(),
            count,
        }
    }

    /// Build a [`FhirPathError::Type`].
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    /// Build an [`FhirPathError::UnknownIdentifier`] for an unknown function.
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Self::UnknownIdentifier {
            kind: "function",
            name: name.into(),
        }
    }

    /// Build an [`FhirPathError::UnknownIdentifier`] for an unknown variable.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownIdentifier {
            kind: "variable",
            name: name.into(),
        }
    }

    /// Build an [`FhirPathError::UnknownIdentifier`] for an unknown type name.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownIdentifier {
            kind: "type",
            name: name.into(),
        }
    }

    /// Build a [`FhirPathError::Unimplemented`].
    pub fn unimplemented(name: impl Into<String>) -> Self {
        Self::Unimplemented { name: name.into() }
    }
}
