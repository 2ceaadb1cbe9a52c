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

//! Precedence-climbing expression parser, driven by [`super::tokenizer`].
//!
//! The ladder below is ordered lowest to highest precedence, matching
//! spec.md §4.1's grammar: implies < or/xor < and < membership (in/contains)
//! < type (is/as) < equality < inequality < union (`|`) < additive <
//! multiplicative < unary < invocation (`.`, `[]`, calls).

use super::tokenizer::{Spanned, Token, tokenize};
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::error::{FhirPathError, Result};
use smallvec::SmallVec;

pub fn parse_expression(input: &str) -> Result<ExpressionNode> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_implies()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Spanned<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token<'a> {
        &self.tokens[self.pos].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> Token<'a> {
        let tok = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token<'a>, what: &str) -> Result<()> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(FhirPathError::parse(self.position(), format!("expected {what}")))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(FhirPathError::parse(
                self.position(),
                "trailing tokens after a complete expression",
            ))
        }
    }

    fn parse_implies(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_or()?;
        while *self.peek() == Token::Implies {
            self.advance();
            let right = self.parse_or()?;
            left = ExpressionNode::binary(BinaryOperator::Implies, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.peek() {
                Token::Or => BinaryOperator::Or,
                Token::Xor => BinaryOperator::Xor,
                _ => break,
            };
            self.advance();
            let right = self.parse_and()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_membership()?;
        while *self.peek() == Token::And {
            self.advance();
            let right = self.parse_membership()?;
            left = ExpressionNode::binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_membership(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_type()?;
        loop {
            let op = match self.peek() {
                Token::In => BinaryOperator::In,
                Token::Contains => BinaryOperator::Contains,
                _ => break,
            };
            self.advance();
            let right = self.parse_type()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_type(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_equality()?;
        loop {
            let is_as = match self.peek() {
                Token::Is => true,
                Token::As => false,
                _ => break,
            };
            self.advance();
            let type_name = self.parse_type_name()?;
            left = if is_as {
                ExpressionNode::Is { expr: Box::new(left), type_name }
            } else {
                ExpressionNode::As { expr: Box::new(left), type_name }
            };
        }
        Ok(left)
    }

    fn parse_type_name(&mut self) -> Result<String> {
        let first = match self.advance() {
            Token::Identifier(s) => s.to_string(),
            _ => return Err(FhirPathError::parse(self.position(), "expected a type name")),
        };
        if *self.peek() == Token::Dot {
            if let Token::Identifier(_) = &self.tokens[self.pos + 1].token {
                self.advance();
                let Token::Identifier(second) = self.advance() else { unreachable!() };
                return Ok(format!("{first}.{second}"));
            }
        }
        Ok(first)
    }

    fn parse_equality(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_inequality()?;
        loop {
            let op = match self.peek() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::Equivalent => BinaryOperator::Equivalent,
                Token::NotEquivalent => BinaryOperator::NotEquivalent,
                _ => break,
            };
            self.advance();
            let right = self.parse_inequality()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_inequality(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_union()?;
        loop {
            let op = match self.peek() {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessOrEqual => BinaryOperator::LessOrEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_union()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_union(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_additive()?;
        while *self.peek() == Token::Pipe {
            self.advance();
            let right = self.parse_additive()?;
            left = ExpressionNode::binary(BinaryOperator::Union, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                Token::Ampersand => BinaryOperator::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Div => BinaryOperator::Div,
                Token::Mod => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = ExpressionNode::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        let op = match self.peek() {
            Token::Plus => Some(UnaryOperator::Plus),
            Token::Minus => Some(UnaryOperator::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(ExpressionNode::Unary { op, operand: Box::new(operand) });
        }
        self.parse_invocation()
    }

    fn parse_invocation(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.parse_member_name()?;
                    left = if *self.peek() == Token::LeftParen {
                        let args = self.parse_args()?;
                        ExpressionNode::method(left, name, args)
                    } else {
                        ExpressionNode::member(left, name)
                    };
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_implies()?;
                    self.expect(&Token::RightBracket, "']'")?;
                    left = ExpressionNode::indexer(left, index);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// A member/method name after `.` — plain identifiers, delimited
    /// identifiers, and the handful of keywords FHIRPath also allows as
    /// invocation names (`as`, `is`, `contains`, ...).
    fn parse_member_name(&mut self) -> Result<String> {
        match self.advance() {
            Token::Identifier(s) => Ok(s.to_string()),
            Token::DelimitedIdentifier(s) => Ok(s),
            Token::As => Ok("as".to_string()),
            Token::Is => Ok("is".to_string()),
            Token::In => Ok("in".to_string()),
            Token::Contains => Ok("contains".to_string()),
            Token::Div => Ok("div".to_string()),
            Token::Mod => Ok("mod".to_string()),
            Token::And => Ok("and".to_string()),
            Token::Or => Ok("or".to_string()),
            Token::Xor => Ok("xor".to_string()),
            Token::Implies => Ok("implies".to_string()),
            _ => Err(FhirPathError::parse(self.position(), "expected a member name")),
        }
    }

    fn parse_args(&mut self) -> Result<SmallVec<[ExpressionNode; 4]>> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut args = SmallVec::new();
        if *self.peek() != Token::RightParen {
            args.push(self.parse_implies()?);
            while *self.peek() == Token::Comma {
                self.advance();
                args.push(self.parse_implies()?);
            }
        }
        self.expect(&Token::RightParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        match self.advance() {
            Token::Integer(n) => {
                let n = i32::try_from(n)
                    .map_err(|_| FhirPathError::parse(self.position(), "integer literal out of range"))?;
                Ok(ExpressionNode::Literal(LiteralValue::Integer(n)))
            }
            Token::Decimal(s) => Ok(ExpressionNode::Literal(LiteralValue::Decimal(s.to_string()))),
            Token::String(s) => Ok(ExpressionNode::Literal(LiteralValue::String(s))),
            Token::Boolean(b) => Ok(ExpressionNode::Literal(LiteralValue::Boolean(b))),
            Token::Date(s) => Ok(ExpressionNode::Literal(LiteralValue::Date(s.to_string()))),
            Token::DateTime(s) => Ok(ExpressionNode::Literal(LiteralValue::DateTime(s.to_string()))),
            Token::Time(s) => Ok(ExpressionNode::Literal(LiteralValue::Time(s.to_string()))),
            Token::Quantity { value, unit } => Ok(ExpressionNode::Literal(LiteralValue::Quantity {
                value: value.to_string(),
                unit: unit.to_string(),
            })),
            Token::Null => Ok(ExpressionNode::Literal(LiteralValue::Null)),
            Token::ExternalConstant(name) => Ok(ExpressionNode::ExternalConstant(name.to_string())),
            Token::QuotedExternalConstant(name) => Ok(ExpressionNode::ExternalConstant(name)),
            Token::This => Ok(ExpressionNode::This),
            Token::Index => Ok(ExpressionNode::Index),
            Token::Total => Ok(ExpressionNode::Total),
            Token::LeftParen => {
                let inner = self.parse_implies()?;
                self.expect(&Token::RightParen, "')'")?;
                Ok(ExpressionNode::Parenthesized(Box::new(inner)))
            }
            Token::Identifier(name) => {
                if *self.peek() == Token::LeftParen {
                    let args = self.parse_args()?;
                    Ok(ExpressionNode::call(name, args))
                } else {
                    Ok(ExpressionNode::Identifier(name.to_string()))
                }
            }
            Token::DelimitedIdentifier(name) => {
                if *self.peek() == Token::LeftParen {
                    let args = self.parse_args()?;
                    Ok(ExpressionNode::call(name, args))
                } else {
                    Ok(ExpressionNode::Identifier(name))
                }
            }
            other => Err(FhirPathError::parse(
                self.position(),
                format!("unexpected token {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_member_chain() {
        let expr = parse_expression("Patient.name.given").unwrap();
        assert!(matches!(expr, ExpressionNode::Member { .. }));
    }

    #[test]
    fn parses_method_call() {
        let expr = parse_expression("name.where(use = 'official')").unwrap();
        match expr {
            ExpressionNode::Invocation(data) => {
                assert_eq!(data.name, "where");
                assert!(data.receiver.is_some());
            }
            _ => panic!("expected Invocation"),
        }
    }

    #[test]
    fn precedence_additive_before_comparison() {
        let expr = parse_expression("1 + 2 < 4").unwrap();
        match expr {
            ExpressionNode::Binary(b) => {
                assert_eq!(b.op, BinaryOperator::LessThan);
                assert!(matches!(b.left, ExpressionNode::Binary(_)));
            }
            _ => panic!("expected Binary"),
        }
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse_expression("1 + 2)").is_err());
    }

    #[test]
    fn parses_is_with_namespaced_type() {
        let expr = parse_expression("x is System.String").unwrap();
        match expr {
            ExpressionNode::Is { type_name, .. } => assert_eq!(type_name, "System.String"),
            _ => panic!("expected Is"),
        }
    }

    #[test]
    fn parses_indexer() {
        let expr = parse_expression("name[0]").unwrap();
        assert!(matches!(expr, ExpressionNode::Indexer { .. }));
    }

    #[test]
    fn parses_quantity_literal() {
        let expr = parse_expression("4 'wk'").unwrap();
        match expr {
            ExpressionNode::Literal(LiteralValue::Quantity { value, unit }) => {
                assert_eq!(value, "4");
                assert_eq!(unit, "wk");
            }
            _ => panic!("expected Quantity literal"),
        }
    }
}
