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

//! The tree-walking evaluator (spec.md §4.2): dispatches every
//! [`ExpressionNode`] variant against a current input collection and an
//! [`EvalContext`] frame, producing a result [`Collection`].

mod context;
pub mod functions;
pub mod operators;

pub use context::EvalContext;

use crate::ast::{BinaryData, BinaryOperator, ExpressionNode, InvocationData, LiteralValue, UnaryOperator};
use crate::error::{FhirPathError, Result};
use crate::model::{Collection, FhirNode, Value};
use functions::conversion::{parse_date_text, parse_datetime_text, parse_quantity_text, parse_time_text};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Evaluate `node` against `input`, the current focus collection, using
/// `ctx` for `$this`/`$index`/`$total`, local and environment variables,
/// the model navigator, and the evaluation-scoped `now` timestamp.
pub fn evaluate(node: &ExpressionNode, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    match node {
        ExpressionNode::Literal(lit) => literal_to_collection(lit),
        ExpressionNode::Identifier(name) => evaluate_identifier(name, ctx, input),
        ExpressionNode::This => Ok(Collection::singleton(ctx.this().clone())),
        ExpressionNode::Index => Ok(ctx
            .index()
            .map(|i| Collection::singleton(Value::Integer(i as i32)))
            .unwrap_or_default()),
        ExpressionNode::Total => Ok(ctx.total().unwrap_or_default()),
        ExpressionNode::ExternalConstant(name) => evaluate_external_constant(name, ctx),
        ExpressionNode::Member { base, name } => {
            let base_result = evaluate(base, ctx, input)?;
            property_access(ctx, &base_result, name)
        }
        ExpressionNode::Indexer { base, index } => {
            let base_result = evaluate(base, ctx, input)?;
            let index_result = evaluate(index, ctx, input)?;
            evaluate_indexer(&base_result, &index_result)
        }
        ExpressionNode::Invocation(data) => evaluate_invocation(data, ctx, input),
        ExpressionNode::Unary { op, operand } => evaluate_unary(*op, operand, ctx, input),
        ExpressionNode::Binary(data) => evaluate_binary(data, ctx, input),
        ExpressionNode::Is { expr, type_name } => {
            let value = evaluate(expr, ctx, input)?;
            let Some(value) = value.as_singleton() else {
                return if value.is_empty() {
                    Ok(Collection::empty())
                } else {
                    Err(FhirPathError::cardinality("is", value.len()))
                };
            };
            let (namespace, name) = split_type_name(type_name);
            Ok(Collection::singleton(Value::Boolean(operators::eval_is(value, namespace, name))))
        }
        ExpressionNode::As { expr, type_name } => {
            let value = evaluate(expr, ctx, input)?;
            let Some(value) = value.as_singleton() else {
                return if value.is_empty() {
                    Ok(Collection::empty())
                } else {
                    Err(FhirPathError::cardinality("as", value.len()))
                };
            };
            let (namespace, name) = split_type_name(type_name);
            Ok(operators::eval_as(value, namespace, name).map(Collection::singleton).unwrap_or_default())
        }
        ExpressionNode::Parenthesized(inner) => evaluate(inner, ctx, input),
    }
}

fn split_type_name(type_name: &str) -> (Option<&str>, &str) {
    match type_name.split_once('.') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, type_name),
    }
}

fn literal_to_collection(lit: &LiteralValue) -> Result<Collection> {
    let value = match lit {
        LiteralValue::Null => return Ok(Collection::empty()),
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Integer(i) => Value::Integer(*i),
        LiteralValue::Decimal(text) => Value::Decimal(
            Decimal::from_str(text).map_err(|e| FhirPathError::parse(0, format!("invalid decimal literal: {e}")))?,
        ),
        LiteralValue::String(s) => Value::string(s.as_str()),
        LiteralValue::Date(text) => Value::Date(
            parse_date_text(text).ok_or_else(|| FhirPathError::parse(0, format!("invalid date literal: {text}")))?,
        ),
        LiteralValue::DateTime(text) => Value::DateTime(
            parse_datetime_text(text)
                .ok_or_else(|| FhirPathError::parse(0, format!("invalid datetime literal: {text}")))?,
        ),
        LiteralValue::Time(text) => Value::Time(
            parse_time_text(text).ok_or_else(|| FhirPathError::parse(0, format!("invalid time literal: {text}")))?,
        ),
        LiteralValue::Quantity { value, unit } => {
            let text = format!("{value} '{unit}'");
            match parse_quantity_text(&text) {
                Some(q) => Value::quantity(q),
                None => {
                    let decimal = Decimal::from_str(value)
                        .map_err(|e| FhirPathError::parse(0, format!("invalid quantity literal: {e}")))?;
                    Value::quantity(crate::model::Quantity::new(decimal, unit.clone()))
                }
            }
        }
    };
    Ok(Collection::singleton(value))
}

/// spec.md §4.2: a bare identifier matching the receiver's own type name is
/// an identity filter; otherwise it's property access flat-mapped over
/// every element.
fn evaluate_identifier(name: &str, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    let is_type_filter = !input.is_empty()
        && input.iter().all(|item| matches!(item, Value::Node(node) if node.type_name.as_ref() == name));
    if is_type_filter {
        return Ok(input.clone());
    }
    property_access(ctx, input, name)
}

fn property_access(ctx: &EvalContext, base: &Collection, name: &str) -> Result<Collection> {
    let mut out = Collection::empty();
    for item in base.iter() {
        match item {
            Value::Node(node) => out.extend(ctx.provider.get_property(node, name)),
            Value::Quantity(q) => match name {
                "value" => out.push(Value::Decimal(q.value)),
                "unit" | "code" => out.push(Value::string(q.unit.as_str())),
                _ => {}
            },
            _ => {}
        }
    }
    Ok(out)
}

fn evaluate_indexer(base: &Collection, index: &Collection) -> Result<Collection> {
    let Some(Value::Integer(i)) = index.as_singleton() else {
        return Ok(Collection::empty());
    };
    if *i < 0 {
        return Ok(Collection::empty());
    }
    Ok(base.as_slice().get(*i as usize).cloned().map(Collection::singleton).unwrap_or_default())
}

fn evaluate_external_constant(name: &str, ctx: &EvalContext) -> Result<Collection> {
    if let Some(value) = well_known_constant(name) {
        return Ok(Collection::singleton(value));
    }
    if let Some(id) = name.strip_prefix("vs-") {
        return Ok(Collection::singleton(Value::string(format!("http://hl7.org/fhir/ValueSet/{id}"))));
    }
    if let Some(id) = name.strip_prefix("ext-") {
        return Ok(Collection::singleton(Value::string(format!("http://hl7.org/fhir/StructureDefinition/{id}"))));
    }
    ctx.lookup_environment(name).ok_or_else(|| FhirPathError::unknown_variable(name))
}

fn well_known_constant(name: &str) -> Option<Value> {
    Some(match name {
        "sct" => Value::string("http://snomed.info/sct"),
        "loinc" => Value::string("http://loinc.org"),
        "ucum" => Value::string("http://unitsofmeasure.org"),
        _ => return None,
    })
}

fn evaluate_unary(op: UnaryOperator, operand: &ExpressionNode, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    let operand_result = evaluate(operand, ctx, input)?;
    let Some(value) = operand_result.as_singleton() else {
        return if operand_result.is_empty() {
            Ok(Collection::empty())
        } else {
            Err(FhirPathError::cardinality("unary operator", operand_result.len()))
        };
    };
    match op {
        UnaryOperator::Plus => match value {
            Value::Integer(_) | Value::Long(_) | Value::Decimal(_) | Value::Quantity(_) => {
                Ok(Collection::singleton(value.clone()))
            }
            other => Err(FhirPathError::type_error(format!("unary '+' is not defined for {}", other.type_of()))),
        },
        UnaryOperator::Minus => match value {
            Value::Integer(i) => Ok(Collection::singleton(Value::Integer(-i))),
            Value::Long(l) => Ok(Collection::singleton(Value::Long(-l))),
            Value::Decimal(d) => Ok(Collection::singleton(Value::Decimal(-d))),
            Value::Quantity(q) => {
                Ok(Collection::singleton(Value::quantity(crate::model::Quantity::new(-q.value, q.unit.clone()))))
            }
            other => Err(FhirPathError::type_error(format!("unary '-' is not defined for {}", other.type_of()))),
        },
    }
}

fn collection_as_optional_bool(c: &Collection, op: &str) -> Result<Option<bool>> {
    match c.as_singleton() {
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(FhirPathError::type_error(format!("'{op}' requires Boolean operands, got {}", other.type_of()))),
        None if c.is_empty() => Ok(None),
        None => Err(FhirPathError::cardinality(op, c.len())),
    }
}

fn optional_bool_to_collection(b: Option<bool>) -> Collection {
    b.map(Value::Boolean).map(Collection::singleton).unwrap_or_default()
}

fn evaluate_binary(data: &BinaryData, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    match data.op {
        BinaryOperator::And => {
            let left = evaluate(&data.left, ctx, input)?;
            let left_bool = collection_as_optional_bool(&left, "and")?;
            if left_bool == Some(false) {
                return Ok(Collection::singleton(Value::Boolean(false)));
            }
            let right = evaluate(&data.right, ctx, input)?;
            let right_bool = collection_as_optional_bool(&right, "and")?;
            Ok(optional_bool_to_collection(operators::and(left_bool, right_bool)))
        }
        BinaryOperator::Or => {
            let left = evaluate(&data.left, ctx, input)?;
            let left_bool = collection_as_optional_bool(&left, "or")?;
            if left_bool == Some(true) {
                return Ok(Collection::singleton(Value::Boolean(true)));
            }
            let right = evaluate(&data.right, ctx, input)?;
            let right_bool = collection_as_optional_bool(&right, "or")?;
            Ok(optional_bool_to_collection(operators::or(left_bool, right_bool)))
        }
        BinaryOperator::Xor => {
            let left_bool = collection_as_optional_bool(&evaluate(&data.left, ctx, input)?, "xor")?;
            let right_bool = collection_as_optional_bool(&evaluate(&data.right, ctx, input)?, "xor")?;
            Ok(optional_bool_to_collection(operators::xor(left_bool, right_bool)))
        }
        BinaryOperator::Implies => {
            let left = evaluate(&data.left, ctx, input)?;
            let left_bool = collection_as_optional_bool(&left, "implies")?;
            if left_bool == Some(false) {
                return Ok(Collection::singleton(Value::Boolean(true)));
            }
            let right = evaluate(&data.right, ctx, input)?;
            let right_bool = collection_as_optional_bool(&right, "implies")?;
            Ok(optional_bool_to_collection(operators::implies(left_bool, right_bool)))
        }
        BinaryOperator::Union => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            Ok(functions::combining::union(&left, &right))
        }
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            let equal = operators::collections_equal(&left, &right);
            let result = if data.op == BinaryOperator::NotEqual { equal.map(|b| !b) } else { equal };
            Ok(optional_bool_to_collection(result))
        }
        BinaryOperator::Equivalent | BinaryOperator::NotEquivalent => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            let equivalent = operators::collections_equivalent(&left, &right);
            let result = if data.op == BinaryOperator::NotEquivalent { !equivalent } else { equivalent };
            Ok(Collection::singleton(Value::Boolean(result)))
        }
        BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterOrEqual => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            match (left.as_singleton(), right.as_singleton()) {
                (Some(a), Some(b)) => {
                    Ok(optional_bool_to_collection(operators::eval_comparison(data.op, a, b)?))
                }
                _ if left.is_empty() || right.is_empty() => Ok(Collection::empty()),
                _ => Err(FhirPathError::cardinality(data.op.as_str(), left.len().max(right.len()))),
            }
        }
        BinaryOperator::In | BinaryOperator::Contains => {
            let (item_expr, collection_expr) = if data.op == BinaryOperator::In {
                (&data.left, &data.right)
            } else {
                (&data.right, &data.left)
            };
            let item_result = evaluate(item_expr, ctx, input)?;
            let collection_result = evaluate(collection_expr, ctx, input)?;
            let Some(item) = item_result.as_singleton() else {
                return if item_result.is_empty() {
                    Ok(Collection::empty())
                } else {
                    Err(FhirPathError::cardinality(data.op.as_str(), item_result.len()))
                };
            };
            Ok(optional_bool_to_collection(operators::eval_in(item, &collection_result)))
        }
        BinaryOperator::Concat => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            let left_value = left.as_singleton().cloned().unwrap_or_else(|| Value::string(""));
            let right_value = right.as_singleton().cloned().unwrap_or_else(|| Value::string(""));
            Ok(operators::eval_arithmetic(BinaryOperator::Concat, &left_value, &right_value)?
                .map(Collection::singleton)
                .unwrap_or_default())
        }
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Div
        | BinaryOperator::Mod => {
            let left = evaluate(&data.left, ctx, input)?;
            let right = evaluate(&data.right, ctx, input)?;
            match (left.as_singleton(), right.as_singleton()) {
                (Some(a), Some(b)) => {
                    Ok(operators::eval_arithmetic(data.op, a, b)?.map(Collection::singleton).unwrap_or_default())
                }
                _ if left.is_empty() || right.is_empty() => Ok(Collection::empty()),
                _ => Err(FhirPathError::cardinality(data.op.as_str(), left.len().max(right.len()))),
            }
        }
    }
}

/// A single required cardinality check shared by the handful of spots
/// (type casts, `ofType`/`type()` receivers) that need a scalar pulled out
/// of a collection the evaluator itself produced.
fn require_singleton_value(c: &Collection, what: &str) -> Result<Option<Value>> {
    match c.len() {
        0 => Ok(None),
        1 => Ok(c.as_singleton().cloned()),
        n => Err(FhirPathError::cardinality(what, n)),
    }
}

fn evaluate_invocation(data: &InvocationData, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    let receiver = match &data.receiver {
        Some(expr) => evaluate(expr, ctx, input)?,
        None => input.clone(),
    };

    match data.name.as_str() {
        "where" => higher_order_filter(&receiver, ctx, data.args.first()),
        "select" => higher_order_select(&receiver, ctx, require_one_arg(data, "select")?),
        "repeat" => higher_order_repeat(&receiver, ctx, require_one_arg(data, "repeat")?),
        "all" => match data.args.first() {
            Some(expr) => higher_order_all(&receiver, ctx, expr),
            None => Ok(Collection::singleton(Value::Boolean(functions::existence::all_true(&receiver)))),
        },
        "exists" => match data.args.first() {
            Some(expr) => higher_order_exists(&receiver, ctx, expr),
            None => Ok(Collection::singleton(Value::Boolean(functions::existence::exists_no_filter(&receiver)))),
        },
        "iif" => higher_order_iif(data, ctx, input),
        "aggregate" => higher_order_aggregate(&receiver, ctx, data),
        "trace" => higher_order_trace(&receiver, ctx, data, input),
        "ofType" => {
            let (namespace, name) = type_arg(data, "ofType")?;
            Ok(functions::type_ops::of_type(&receiver, namespace, &name))
        }
        "type" => {
            require_no_args(data, "type")?;
            Ok(functions::type_ops::type_of(&receiver))
        }
        "is" => {
            let (namespace, name) = type_arg(data, "is")?;
            let Some(value) = require_singleton_value(&receiver, "is")? else { return Ok(Collection::empty()) };
            Ok(Collection::singleton(Value::Boolean(operators::eval_is(&value, namespace, &name))))
        }
        "as" => {
            let (namespace, name) = type_arg(data, "as")?;
            let Some(value) = require_singleton_value(&receiver, "as")? else { return Ok(Collection::empty()) };
            Ok(operators::eval_as(&value, namespace, &name).map(Collection::singleton).unwrap_or_default())
        }
        other => dispatch_plain_function(other, &receiver, data, ctx, input),
    }
}

fn require_one_arg<'a>(data: &'a InvocationData, fn_name: &str) -> Result<&'a ExpressionNode> {
    data.args.first().ok_or_else(|| FhirPathError::unknown_function(format!("{fn_name}() requires an argument")))
}

fn require_no_args(data: &InvocationData, fn_name: &str) -> Result<()> {
    if data.args.is_empty() {
        Ok(())
    } else {
        Err(FhirPathError::type_error(format!("{fn_name}() takes no arguments")))
    }
}

/// `ofType`/`is`/`as` take a type specifier, not a general expression —
/// pull the dotted name straight out of the AST shape the parser produces
/// for a bare identifier or `Namespace.Name` member chain.
fn type_arg<'a>(data: &'a InvocationData, fn_name: &str) -> Result<(Option<&'a str>, String)> {
    let arg = require_one_arg(data, fn_name)?;
    match arg {
        ExpressionNode::Identifier(name) => Ok((None, name.clone())),
        ExpressionNode::Member { base, name } => match base.as_ref() {
            ExpressionNode::Identifier(ns) => Ok((Some(ns.as_str()), name.clone())),
            _ => Err(FhirPathError::type_error(format!("{fn_name}() expects a type name"))),
        },
        _ => Err(FhirPathError::type_error(format!("{fn_name}() expects a type name"))),
    }
}

fn higher_order_filter(receiver: &Collection, ctx: &EvalContext, expr: Option<&ExpressionNode>) -> Result<Collection> {
    let Some(expr) = expr else {
        return Err(FhirPathError::unknown_function("where() requires an argument"));
    };
    let mut out = Collection::empty();
    for (index, item) in receiver.iter().enumerate() {
        let child_ctx = ctx.with_item(item.clone(), index);
        let kept = evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?;
        if kept.as_singleton().and_then(Value::as_bool) == Some(true) {
            out.push(item.clone());
        }
    }
    Ok(out)
}

fn higher_order_select(receiver: &Collection, ctx: &EvalContext, expr: &ExpressionNode) -> Result<Collection> {
    let mut out = Collection::empty();
    for (index, item) in receiver.iter().enumerate() {
        let child_ctx = ctx.with_item(item.clone(), index);
        out.extend(evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?);
    }
    Ok(out)
}

/// `repeat(expr)`: apply `expr` to every item, then to every newly produced
/// item, until a pass produces nothing not already seen (spec.md §4.4's
/// "iterates to a fixed point").
fn higher_order_repeat(receiver: &Collection, ctx: &EvalContext, expr: &ExpressionNode) -> Result<Collection> {
    let mut seen = Collection::empty();
    let mut frontier: Vec<Value> = receiver.iter().cloned().collect();
    let mut out = Collection::empty();

    loop {
        let mut next_frontier = Vec::new();
        for (index, item) in frontier.iter().enumerate() {
            let child_ctx = ctx.with_item(item.clone(), index);
            let produced = evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?;
            for value in produced {
                if operators::eval_in(&value, &seen) != Some(true) {
                    seen.push(value.clone());
                    out.push(value.clone());
                    next_frontier.push(value);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }
    Ok(out)
}

fn higher_order_all(receiver: &Collection, ctx: &EvalContext, expr: &ExpressionNode) -> Result<Collection> {
    for (index, item) in receiver.iter().enumerate() {
        let child_ctx = ctx.with_item(item.clone(), index);
        let result = evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?;
        if result.as_singleton().and_then(Value::as_bool) != Some(true) {
            return Ok(Collection::singleton(Value::Boolean(false)));
        }
    }
    Ok(Collection::singleton(Value::Boolean(true)))
}

fn higher_order_exists(receiver: &Collection, ctx: &EvalContext, expr: &ExpressionNode) -> Result<Collection> {
    for (index, item) in receiver.iter().enumerate() {
        let child_ctx = ctx.with_item(item.clone(), index);
        let result = evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?;
        if result.as_singleton().and_then(Value::as_bool) == Some(true) {
            return Ok(Collection::singleton(Value::Boolean(true)));
        }
    }
    Ok(Collection::singleton(Value::Boolean(false)))
}

/// `iif(condition, then, else?)`: short-circuits on the condition, per
/// spec.md §4.2, never evaluating the untaken branch.
fn higher_order_iif(data: &InvocationData, ctx: &EvalContext, input: &Collection) -> Result<Collection> {
    if data.args.len() < 2 || data.args.len() > 3 {
        return Err(FhirPathError::type_error("iif() takes 2 or 3 arguments"));
    }
    let condition = evaluate(&data.args[0], ctx, input)?;
    let taken = condition.as_singleton().and_then(Value::as_bool) == Some(true);
    if taken {
        evaluate(&data.args[1], ctx, input)
    } else if let Some(else_expr) = data.args.get(2) {
        evaluate(else_expr, ctx, input)
    } else {
        Ok(Collection::empty())
    }
}

/// `aggregate(expr, init?)`: `$total` carries the running accumulator, one
/// step per receiver element, starting from `init` (empty if omitted).
fn higher_order_aggregate(receiver: &Collection, ctx: &EvalContext, data: &InvocationData) -> Result<Collection> {
    if data.args.is_empty() || data.args.len() > 2 {
        return Err(FhirPathError::type_error("aggregate() takes an expression and an optional init value"));
    }
    let expr = &data.args[0];
    let mut total = match data.args.get(1) {
        Some(init_expr) => evaluate(init_expr, ctx, receiver)?,
        None => Collection::empty(),
    };
    for (index, item) in receiver.iter().enumerate() {
        let child_ctx = ctx.with_aggregate_item(item.clone(), index, total.clone());
        total = evaluate(expr, &child_ctx, &Collection::singleton(item.clone()))?;
    }
    Ok(total)
}

fn higher_order_trace(receiver: &Collection, ctx: &EvalContext, data: &InvocationData, input: &Collection) -> Result<Collection> {
    let name_arg = evaluate(data.args.first().ok_or_else(|| FhirPathError::type_error("trace() requires a name"))?, ctx, input)?;
    let name = match name_arg.as_singleton() {
        Some(Value::String(s)) => s.to_string(),
        _ => return Err(FhirPathError::type_error("trace() requires a String name")),
    };
    let projected = match data.args.get(1) {
        Some(expr) => evaluate(expr, ctx, receiver)?,
        None => Collection::empty(),
    };
    Ok(functions::utility::trace(receiver, &name, &projected))
}

/// Evaluate every non-lambda argument expression against the ambient
/// `input`/`ctx` (not per receiver element), per spec.md §4.4.
fn evaluate_args(data: &InvocationData, ctx: &EvalContext, input: &Collection) -> Result<Vec<Collection>> {
    data.args.iter().map(|arg| evaluate(arg, ctx, input)).collect()
}

fn arg_string(args: &[Collection], index: usize, fn_name: &str) -> Result<String> {
    match args.get(index).and_then(|c| c.as_singleton()) {
        Some(Value::String(s)) => Ok(s.to_string()),
        _ => Err(FhirPathError::type_error(format!("{fn_name}() requires a String argument"))),
    }
}

fn arg_opt_string(args: &[Collection], index: usize) -> Option<String> {
    match args.get(index).and_then(|c| c.as_singleton()) {
        Some(Value::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

fn arg_i64(args: &[Collection], index: usize, fn_name: &str) -> Result<i64> {
    match args.get(index).and_then(|c| c.as_singleton()) {
        Some(Value::Integer(i)) => Ok(*i as i64),
        Some(Value::Long(l)) => Ok(*l),
        _ => Err(FhirPathError::type_error(format!("{fn_name}() requires an Integer argument"))),
    }
}

fn arg_opt_i64(args: &[Collection], index: usize) -> Option<i64> {
    match args.get(index).and_then(|c| c.as_singleton()) {
        Some(Value::Integer(i)) => Some(*i as i64),
        Some(Value::Long(l)) => Some(*l),
        _ => None,
    }
}

fn arg_decimal(args: &[Collection], index: usize, fn_name: &str) -> Result<Decimal> {
    match args.get(index).and_then(|c| c.as_singleton()) {
        Some(Value::Decimal(d)) => Ok(*d),
        Some(Value::Integer(i)) => Ok(Decimal::from(*i)),
        Some(Value::Long(l)) => Ok(Decimal::from(*l)),
        _ => Err(FhirPathError::type_error(format!("{fn_name}() requires a numeric argument"))),
    }
}

fn dispatch_plain_function(
    name: &str,
    receiver: &Collection,
    data: &InvocationData,
    ctx: &EvalContext,
    input: &Collection,
) -> Result<Collection> {
    use functions::*;

    let args = evaluate_args(data, ctx, input)?;
    let bool_singleton = |b: bool| Ok(Collection::singleton(Value::Boolean(b)));
    let int_singleton = |n: i64| Ok(Collection::singleton(Value::Integer(n as i32)));

    match name {
        // Existence
        "empty" => bool_singleton(existence::is_empty(receiver)),
        "count" => int_singleton(existence::count(receiver)),
        "distinct" => Ok(existence::distinct(receiver)),
        "isDistinct" => bool_singleton(existence::is_distinct(receiver)),
        "allTrue" => bool_singleton(existence::all_true(receiver)),
        "anyTrue" => bool_singleton(existence::any_true(receiver)),
        "allFalse" => bool_singleton(existence::all_false(receiver)),
        "anyFalse" => bool_singleton(existence::any_false(receiver)),
        "subsetOf" => bool_singleton(existence::subset_of(receiver, &args[0])),
        "supersetOf" => bool_singleton(existence::superset_of(receiver, &args[0])),

        // Subsetting
        "single" => subsetting::single(receiver),
        "first" => Ok(subsetting::first(receiver)),
        "last" => Ok(subsetting::last(receiver)),
        "tail" => Ok(subsetting::tail(receiver)),
        "skip" => Ok(subsetting::skip(receiver, arg_i64(&args, 0, "skip")?)),
        "take" => Ok(subsetting::take(receiver, arg_i64(&args, 0, "take")?)),
        "intersect" => Ok(subsetting::intersect(receiver, &args[0])),
        "exclude" => Ok(subsetting::exclude(receiver, &args[0])),

        // Combining
        "union" => Ok(combining::union(receiver, &args[0])),
        "combine" => Ok(combining::combine(receiver, &args[0])),

        // Conversion
        "toBoolean" => conversion::to_boolean(receiver),
        "convertsToBoolean" => conversion::converts_to_boolean(receiver),
        "toInteger" => conversion::to_integer(receiver),
        "convertsToInteger" => conversion::converts_to_integer(receiver),
        "toDecimal" => conversion::to_decimal(receiver),
        "convertsToDecimal" => conversion::converts_to_decimal(receiver),
        "toDate" => conversion::to_date(receiver),
        "convertsToDate" => conversion::converts_to_date(receiver),
        "toDateTime" => conversion::to_date_time(receiver),
        "convertsToDateTime" => conversion::converts_to_date_time(receiver),
        "toTime" => conversion::to_time(receiver),
        "convertsToTime" => conversion::converts_to_time(receiver),
        "toString" => conversion::to_string(receiver),
        "convertsToString" => conversion::converts_to_string(receiver),
        "toQuantity" => conversion::to_quantity(receiver, arg_opt_string(&args, 0).as_deref()),
        "convertsToQuantity" => conversion::converts_to_quantity(receiver, arg_opt_string(&args, 0).as_deref()),

        // String
        "indexOf" => string::index_of(receiver, &arg_string(&args, 0, "indexOf")?),
        "substring" => string::substring(receiver, arg_i64(&args, 0, "substring")?, arg_opt_i64(&args, 1)),
        "startsWith" => string::starts_with(receiver, &arg_string(&args, 0, "startsWith")?),
        "endsWith" => string::ends_with(receiver, &arg_string(&args, 0, "endsWith")?),
        "contains" => string::string_contains(receiver, &arg_string(&args, 0, "contains")?),
        "upper" => string::upper(receiver),
        "lower" => string::lower(receiver),
        "replace" => string::replace(receiver, &arg_string(&args, 0, "replace")?, &arg_string(&args, 1, "replace")?),
        "matches" => string::matches(receiver, &arg_string(&args, 0, "matches")?),
        "matchesFull" => string::matches_full(receiver, &arg_string(&args, 0, "matchesFull")?),
        "replaceMatches" => {
            string::replace_matches(receiver, &arg_string(&args, 0, "replaceMatches")?, &arg_string(&args, 1, "replaceMatches")?)
        }
        "length" => string::length(receiver),
        "toChars" => string::to_chars(receiver),
        "trim" => string::trim(receiver),
        "split" => string::split(receiver, &arg_string(&args, 0, "split")?),
        "join" => string::join(receiver, &arg_opt_string(&args, 0).unwrap_or_default()),

        // Math
        "abs" => math::abs(receiver),
        "ceiling" => math::ceiling(receiver),
        "floor" => math::floor(receiver),
        "truncate" => math::truncate(receiver),
        "round" => math::round(receiver, arg_opt_i64(&args, 0).unwrap_or(0).max(0) as u32),
        "sqrt" => math::sqrt(receiver),
        "ln" => math::ln(receiver),
        "log" => math::log(receiver, arg_decimal(&args, 0, "log")?),
        "exp" => math::exp(receiver),
        "power" => math::power(receiver, arg_decimal(&args, 0, "power")?),

        // Tree
        "children" => Ok(tree::children(receiver, ctx.provider.as_ref())),
        "descendants" => Ok(tree::descendants(receiver, ctx.provider.as_ref())),

        // Utility
        "now" => Ok(utility::now(ctx.now())),
        "today" => Ok(utility::today(ctx.now())),
        "timeOfDay" => Ok(utility::time_of_day(ctx.now())),

        // Boundary
        "lowBoundary" => boundary::low_boundary(receiver, arg_opt_i64(&args, 0)),
        "highBoundary" => boundary::high_boundary(receiver, arg_opt_i64(&args, 0)),
        "precision" => boundary::precision(receiver),

        _ => Err(FhirPathError::unknown_function(name)),
    }
}

/// spec.md §4.4's "residual-conversion pass": after evaluation completes,
/// any remaining FHIR primitive node in the top-level result is coerced to
/// its System counterpart so callers see a uniform value model.
pub fn resolve_residual_conversions(result: Collection) -> Collection {
    result
        .into_iter()
        .map(|value| match &value {
            Value::Node(node) => fhir_primitive_to_system_value(node).unwrap_or(value),
            _ => value,
        })
        .collect()
}

fn fhir_primitive_to_system_value(node: &FhirNode) -> Option<Value> {
    let system = crate::model::types::fhir_primitive_to_system(node.type_name.as_ref())?;
    let json = node.json.as_ref();
    match (system, json) {
        ("Boolean", serde_json::Value::Bool(b)) => Some(Value::Boolean(*b)),
        ("Integer", serde_json::Value::Number(n)) => n.as_i64().map(|v| Value::Integer(v as i32)),
        ("Decimal", serde_json::Value::Number(n)) => {
            n.as_f64().and_then(|v| Decimal::try_from(v).ok()).map(Value::Decimal)
        }
        ("String", serde_json::Value::String(s)) => Some(Value::string(s.as_str())),
        ("Date", serde_json::Value::String(s)) => parse_date_text(s).map(Value::Date),
        ("DateTime", serde_json::Value::String(s)) => parse_datetime_text(s).map(Value::DateTime),
        ("Time", serde_json::Value::String(s)) => parse_time_text(s).map(Value::Time),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FhirVersion, GenericJsonProvider};
    use chrono::DateTime;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx() -> EvalContext {
        EvalContext::root(
            Value::Boolean(true),
            HashMap::new(),
            Arc::new(GenericJsonProvider::new(FhirVersion::R4)),
            DateTime::parse_from_rfc3339("2024-06-15T10:00:00Z").unwrap(),
        )
    }

    fn parse(expr: &str) -> ExpressionNode {
        crate::parser::parse(expr).unwrap()
    }

    fn patient_input() -> Collection {
        Collection::singleton(Value::Node(FhirNode::new(
            Arc::new(json!({
                "resourceType": "Patient",
                "name": [{"given": ["Ada", "K."], "family": "Lovelace", "use": "official"}],
                "active": true,
            })),
            "Patient",
        )))
    }

    #[test]
    fn literal_integer_evaluates_to_singleton() {
        let result = evaluate(&parse("42"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::Integer(42)));
    }

    #[test]
    fn identifier_type_filter_matches_resource_type() {
        let input = patient_input();
        let result = evaluate(&parse("Patient"), &ctx(), &input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn member_access_flat_maps_over_collection() {
        let input = patient_input();
        let result = evaluate(&parse("Patient.name.given"), &ctx(), &input).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn where_filters_by_predicate() {
        let input = patient_input();
        let result = evaluate(&parse("Patient.name.where(use = 'official')"), &ctx(), &input).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn and_short_circuits_on_false_left() {
        let result = evaluate(&parse("false and (1/0 > 0)"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::Boolean(false)));
    }

    #[test]
    fn iif_short_circuits_the_untaken_branch() {
        let result = evaluate(&parse("iif(true, 'a', 1/0)"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::string("a")));
    }

    #[test]
    fn division_by_zero_propagates_as_empty_not_error() {
        let result = evaluate(&parse("1 / 0"), &ctx(), &Collection::empty()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn indexer_out_of_range_is_empty() {
        let input: Collection = vec![Value::Integer(1), Value::Integer(2)].into_iter().collect();
        let result = evaluate(&parse("$this[5]"), &ctx().with_item(Value::Integer(1), 0), &input).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn aggregate_sums_with_initial_value() {
        let input: Collection = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)].into_iter().collect();
        let result = evaluate(&parse("aggregate($this + $total, 0)"), &ctx(), &input).unwrap();
        assert_eq!(result, Collection::singleton(Value::Integer(6)));
    }

    #[test]
    fn environment_variable_resolves_well_known_constants() {
        let result = evaluate(&parse("%ucum"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::string("http://unitsofmeasure.org")));
    }

    #[test]
    fn is_and_as_dispatch_through_the_operator_module() {
        let result = evaluate(&parse("1 is Integer"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::Boolean(true)));
        let result = evaluate(&parse("1.as(Decimal)"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::Decimal(1.into())));
    }

    #[test]
    fn repeat_reaches_a_fixed_point_with_no_duplicates() {
        let input = patient_input();
        let result = evaluate(&parse("Patient.repeat(children())"), &ctx(), &input).unwrap();
        assert!(!result.is_empty());
    }

    #[test]
    fn quantity_value_and_unit_are_readable_through_property_access() {
        let result = evaluate(&parse("5.toQuantity().value"), &ctx(), &Collection::empty()).unwrap();
        assert_eq!(result, Collection::singleton(Value::Decimal(5.into())));
    }

    #[test]
    fn residual_conversion_coerces_a_fhir_primitive_to_system_boolean() {
        let node = FhirNode::new(Arc::new(json!(true)), "boolean");
        let result = resolve_residual_conversions(Collection::singleton(Value::Node(node)));
        assert_eq!(result, Collection::singleton(Value::Boolean(true)));
    }
}
