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

//! Drives the FHIRPath grammar: tokenize, then precedence-climb into an
//! [`crate::ast::ExpressionNode`]. A parse that leaves trailing tokens is
//! rejected rather than silently returning a partial tree (spec.md §8's
//! "grammar totality").

mod pratt;
mod tokenizer;

pub use pratt::parse_expression;

/// Parse a FHIRPath expression string into an AST.
pub fn parse(input: &str) -> crate::error::Result<crate::ast::ExpressionNode> {
    parse_expression(input)
}
