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

//! Expression AST node definitions.

use super::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;

/// A parsed FHIRPath expression.
///
/// Node kinds correspond directly to spec.md §4.1's grammar list. Larger
/// variants are boxed to keep the common cases (`Literal`, `Identifier`,
/// `This`) cheap to move around during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// A literal value.
    Literal(LiteralValue),
    /// A bare identifier — a type name or a property access on the receiver.
    Identifier(String),
    /// `$this`
    This,
    /// `$index`
    Index,
    /// `$total`
    Total,
    /// `%name` or `%'name'` — an external constant lookup.
    ExternalConstant(String),
    /// `a.b` — member access.
    Member {
        /// The base expression.
        base: Box<ExpressionNode>,
        /// The property name being accessed.
        name: String,
    },
    /// `a[i]` — indexer.
    Indexer {
        /// The collection expression.
        base: Box<ExpressionNode>,
        /// The index expression.
        index: Box<ExpressionNode>,
    },
    /// `f(args)` or `a.f(args)` — function invocation, with an optional
    /// explicit receiver (`None` means the ambient receiver is used).
    Invocation(Box<InvocationData>),
    /// Unary `+`/`-`.
    Unary {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        operand: Box<ExpressionNode>,
    },
    /// A binary operator application.
    Binary(Box<BinaryData>),
    /// `a is T`
    Is {
        /// The expression under test.
        expr: Box<ExpressionNode>,
        /// The target type name, possibly namespaced (`System.String`).
        type_name: String,
    },
    /// `a as T`
    As {
        /// The expression being cast.
        expr: Box<ExpressionNode>,
        /// The target type name.
        type_name: String,
    },
    /// A parenthesized expression. Kept as its own node so re-printing
    /// (for diagnostics) can round-trip; evaluates identically to its inner.
    Parenthesized(Box<ExpressionNode>),
}

/// Function/method invocation data, boxed out of [`ExpressionNode`] to keep
/// the enum small.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationData {
    /// Explicit receiver for a method call (`a.f()`); `None` for a bare
    /// function call evaluated against the ambient receiver.
    pub receiver: Option<ExpressionNode>,
    /// The function name.
    pub name: String,
    /// Argument expressions, left to right.
    pub args: SmallVec<[ExpressionNode; 4]>,
}

/// Binary operator application data, boxed out of [`ExpressionNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryData {
    /// The operator.
    pub op: BinaryOperator,
    /// Left operand.
    pub left: ExpressionNode,
    /// Right operand.
    pub right: ExpressionNode,
}

/// Literal values that can appear directly in expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// `{}`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// A bare integer, e.g. `42`.
    Integer(i32),
    /// A decimal, stored as text to preserve the author's precision.
    Decimal(String),
    /// A single- or double-quoted string, already unescaped.
    String(String),
    /// `@2024-01-05`
    Date(String),
    /// `@2024-01-05T10:30:00Z`
    DateTime(String),
    /// `@T10:30:00`
    Time(String),
    /// `4 'wk'` or `4 weeks`
    Quantity {
        /// The numeric component, as text.
        value: String,
        /// The unit string, without surrounding quotes.
        unit: String,
    },
}

impl ExpressionNode {
    /// Build a `Member` node.
    pub fn member(base: ExpressionNode, name: impl Into<String>) -> Self {
        Self::Member {
            base: Box::new(base),
            name: name.into(),
        }
    }

    /// Build an `Indexer` node.
    pub fn indexer(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Indexer {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Build a bare function-call `Invocation` node (no explicit receiver).
    pub fn call(name: impl Into<String>, args: SmallVec<[ExpressionNode; 4]>) -> Self {
        Self::Invocation(Box::new(InvocationData {
            receiver: None,
            name: name.into(),
            args,
        }))
    }

    /// Build a method-call `Invocation` node with an explicit receiver.
    pub fn method(
        receiver: ExpressionNode,
        name: impl Into<String>,
        args: SmallVec<[ExpressionNode; 4]>,
    ) -> Self {
        Self::Invocation(Box::new(InvocationData {
            receiver: Some(receiver),
            name: name.into(),
            args,
        }))
    }

    /// Build a `Binary` node.
    pub fn binary(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::Binary(Box::new(BinaryData { op, left, right }))
    }

    /// True for the small set of node kinds that never need to evaluate a
    /// child — used by the higher-order functions to decide whether an
    /// argument must be re-evaluated per element.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Literal(_) | Self::This | Self::Index | Self::Total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_chain_builds_nested_nodes() {
        let expr = ExpressionNode::member(
            ExpressionNode::member(ExpressionNode::Identifier("Patient".into()), "name"),
            "given",
        );
        match expr {
            ExpressionNode::Member { name, base } => {
                assert_eq!(name, "given");
                assert!(matches!(*base, ExpressionNode::Member { .. }));
            }
            _ => panic!("expected Member"),
        }
    }

    #[test]
    fn leaf_detection() {
        assert!(ExpressionNode::This.is_leaf());
        assert!(ExpressionNode::Literal(LiteralValue::Boolean(true)).is_leaf());
        assert!(!ExpressionNode::Identifier("x".into()).is_leaf());
    }
}
