// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter-expression compiler.
//!
//! Compiles [`Criteria`] into the aggregation expression language accepted
//! by `FT.CREATE ... FILTER {expr}`, which pre-filters which rows under the
//! index prefix are indexed at all. Expressions reference stored attributes,
//! not index aliases; dates compare on their shadow attribute.
//!
//! ```text
//! @age>18 && startswith(@name,"A")
//! (@status=="active" || @status=="trial")
//! ```

use super::criteria::{Connector, Criteria, Criterion, Operator};
use crate::error::{DocError, DocResult};
use crate::metrics;
use crate::schema::field_codec::{canonical_bool, canonical_number, parse_epoch_millis, shadow_name};
use crate::schema::{DocumentSchema, LogicalType, SchemaItem};

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Compile `criteria` to a FILTER expression; `None` when nothing filters.
pub fn compile_filter(criteria: &Criteria, schema: &DocumentSchema) -> DocResult<Option<String>> {
    let result = compile_inner(criteria, schema);
    metrics::record_compile("filter", result.is_ok());
    result
}

fn compile_inner(criteria: &Criteria, schema: &DocumentSchema) -> DocResult<Option<String>> {
    let mut expr: Option<(String, bool)> = None;
    for (connector, criterion) in criteria.predicates() {
        let item = schema.require(&criterion.field)?;
        let Some(term) = compile_criterion(criterion, item)? else {
            continue;
        };
        expr = Some(match (expr, connector) {
            (None, _) => (term, false),
            (Some((left, _)), Connector::And) => (format!("{} && {}", left, term), true),
            (Some((left, is_and)), Connector::Or) => {
                let left = if is_and { format!("({})", left) } else { left };
                (format!("({} || {})", left, term), false)
            }
        });
    }
    Ok(expr.map(|(e, _)| e))
}

fn unsupported(item: &SchemaItem, op: Operator) -> DocError {
    DocError::UnsupportedOperator {
        field: item.name.clone(),
        operator: op.to_string(),
    }
}

fn arity(item: &SchemaItem, op: Operator, expected: &'static str, actual: usize) -> DocError {
    DocError::Arity {
        field: item.name.clone(),
        operator: op.to_string(),
        expected,
        actual,
    }
}

fn compile_criterion(criterion: &Criterion, item: &SchemaItem) -> DocResult<Option<String>> {
    let op = criterion.operator;
    let values = &criterion.values;
    if op.is_directive() || op == Operator::GeoLocation || item.logical_type == LogicalType::Geo {
        return Err(unsupported(item, op));
    }
    if values.is_empty() && matches!(op, Operator::In | Operator::NotIn) {
        return Ok(None);
    }
    match op.fixed_arity() {
        Some(n) if values.len() != n => return Err(arity(item, op, "exactly 2", values.len())),
        None if values.is_empty() => return Err(arity(item, op, "at least 1", 0)),
        None if values.len() > 1 && !matches!(op, Operator::In | Operator::NotIn) => {
            return Err(arity(item, op, "exactly 1", values.len()))
        }
        _ => {}
    }

    // (attribute, literal) per value, typed the way the expression compares them.
    let (attribute, literals): (String, Vec<String>) = match item.logical_type {
        LogicalType::Integer | LogicalType::Long | LogicalType::Float | LogicalType::Double => (
            item.name.clone(),
            values
                .iter()
                .map(|v| canonical_number(item, v))
                .collect::<DocResult<_>>()?,
        ),
        LogicalType::Date | LogicalType::DateTime => (
            shadow_name(&item.name),
            values
                .iter()
                .map(|v| {
                    parse_epoch_millis(item.logical_type, v)
                        .map(|ms| ms.to_string())
                        .ok_or_else(|| DocError::Type {
                            field: item.name.clone(),
                            value: v.clone(),
                            expected: "date",
                        })
                })
                .collect::<DocResult<_>>()?,
        ),
        LogicalType::Boolean => (
            item.name.clone(),
            values
                .iter()
                .map(|v| {
                    canonical_bool(v).map(quote).ok_or_else(|| DocError::Type {
                        field: item.name.clone(),
                        value: v.clone(),
                        expected: "boolean",
                    })
                })
                .collect::<DocResult<_>>()?,
        ),
        LogicalType::Text => (item.name.clone(), values.iter().map(|v| quote(v)).collect()),
        LogicalType::Geo => return Err(unsupported(item, op)),
    };

    let ordered = item.logical_type.is_number() || item.logical_type.is_date();
    let a = format!("@{}", attribute);
    let l = &literals;
    let term = match op {
        Operator::Equal => format!("{}=={}", a, l[0]),
        Operator::NotEqual => format!("{}!={}", a, l[0]),
        Operator::In => {
            let parts: Vec<String> = l.iter().map(|v| format!("{}=={}", a, v)).collect();
            if parts.len() == 1 {
                parts.join("")
            } else {
                format!("({})", parts.join(" || "))
            }
        }
        Operator::NotIn => {
            let parts: Vec<String> = l.iter().map(|v| format!("{}!={}", a, v)).collect();
            if parts.len() == 1 {
                parts.join("")
            } else {
                format!("({})", parts.join(" && "))
            }
        }
        Operator::StartsWith if item.logical_type == LogicalType::Text => {
            format!("startswith({},{})", a, l[0])
        }
        Operator::GreaterThan if ordered => format!("{}>{}", a, l[0]),
        Operator::GreaterThanEqual if ordered => format!("{}>={}", a, l[0]),
        Operator::LessThan if ordered => format!("{}<{}", a, l[0]),
        Operator::LessThanEqual if ordered => format!("{}<={}", a, l[0]),
        Operator::Between if ordered => format!("({}>{} && {}<{})", a, l[0], a, l[1]),
        Operator::BetweenInclusive if ordered => format!("({}>={} && {}<={})", a, l[0], a, l[1]),
        Operator::NotBetween if ordered => format!("({}<{} || {}>{})", a, l[0], a, l[1]),
        _ => return Err(unsupported(item, op)),
    };
    Ok(Some(term))
}
