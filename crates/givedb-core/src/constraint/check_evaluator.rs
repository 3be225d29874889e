//! Check constraint expression evaluator.
//!
//! Supports a small expression language for CHECK constraints:
//! - Field comparisons: `amount > 0`, `recurring = TRUE`
//! - Null checks: `recurrence_interval IS NOT NULL`, `donated_at IS NULL`
//! - IN lists: `status IN ('pending', 'approved')`
//! - Boolean operators: `AND`, `OR`, `NOT` (OR binds loosest)
//! - Parentheses for grouping

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use crate::value::Value;

/// Errors that can occur during expression evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    /// Unknown field referenced in expression.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Type mismatch in comparison.
    #[error("type mismatch: cannot compare {left_type} with {right_type}")]
    TypeMismatch {
        /// Left operand type.
        left_type: String,
        /// Right operand type.
        right_type: String,
    },

    /// Invalid expression syntax.
    #[error("invalid expression syntax: {0}")]
    InvalidSyntax(String),
}

/// Check constraint expression evaluator.
pub struct CheckEvaluator;

impl CheckEvaluator {
    /// Evaluate a check expression against record data.
    ///
    /// Returns `true` if the constraint is satisfied. Comparisons against
    /// null are never satisfied; use `IS NULL` to test for absence.
    pub fn evaluate(expression: &str, data: &HashMap<String, Value>) -> Result<bool, EvaluationError> {
        let expr = expression.trim();
        if expr.is_empty() {
            return Ok(true);
        }

        Self::evaluate_expr(expr, data)
    }

    fn evaluate_expr(expr: &str, data: &HashMap<String, Value>) -> Result<bool, EvaluationError> {
        let expr = expr.trim();

        if let Some(inner) = Self::strip_outer_parens(expr) {
            return Self::evaluate_expr(inner, data);
        }

        if let Some((left, right)) = Self::split_keyword(expr, "OR") {
            return Ok(Self::evaluate_expr(left, data)? || Self::evaluate_expr(right, data)?);
        }

        if let Some((left, right)) = Self::split_keyword(expr, "AND") {
            return Ok(Self::evaluate_expr(left, data)? && Self::evaluate_expr(right, data)?);
        }

        if let Some(rest) = Self::strip_keyword_prefix(expr, "NOT") {
            return Ok(!Self::evaluate_expr(rest, data)?);
        }

        if let Some(field) = Self::strip_suffix_ci(expr, " IS NOT NULL") {
            return Ok(!Self::field(field, data)?.is_null());
        }

        if let Some(field) = Self::strip_suffix_ci(expr, " IS NULL") {
            return Ok(Self::field(field, data)?.is_null());
        }

        if let Some((field, values)) = Self::extract_in(expr) {
            let value = Self::field(field, data)?;
            return Ok(Self::evaluate_in(value, &values));
        }

        Self::evaluate_comparison(expr, data)
    }

    fn field<'d>(name: &str, data: &'d HashMap<String, Value>) -> Result<&'d Value, EvaluationError> {
        let name = name.trim();
        data.get(name)
            .ok_or_else(|| EvaluationError::UnknownField(name.to_string()))
    }

    /// Strip one pair of parentheses if it wraps the whole expression.
    fn strip_outer_parens(expr: &str) -> Option<&str> {
        if !(expr.starts_with('(') && expr.ends_with(')')) {
            return None;
        }
        let mut depth = 0i32;
        for (i, b) in expr.bytes().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 && i != expr.len() - 1 {
                        return None;
                    }
                }
                _ => {}
            }
        }
        Some(&expr[1..expr.len() - 1])
    }

    /// Byte offsets of top-level positions: outside quotes and parentheses.
    fn top_level_positions(expr: &str) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut depth = 0i32;
        let mut quote: Option<u8> = None;

        for (i, b) in expr.bytes().enumerate() {
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ if depth == 0 => positions.push(i),
                _ => {}
            }
        }
        positions
    }

    /// Split at the first top-level occurrence of a whitespace-delimited keyword.
    fn split_keyword<'a>(expr: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
        let bytes = expr.as_bytes();
        let kw = keyword.as_bytes();

        for i in Self::top_level_positions(expr) {
            let end = i + kw.len();
            if i == 0 || end >= bytes.len() {
                continue;
            }
            if bytes[i - 1].is_ascii_whitespace()
                && bytes[end].is_ascii_whitespace()
                && bytes[i..end].eq_ignore_ascii_case(kw)
            {
                return Some((expr[..i].trim(), expr[end..].trim()));
            }
        }
        None
    }

    fn strip_keyword_prefix<'a>(expr: &'a str, keyword: &str) -> Option<&'a str> {
        let kw = keyword.len();
        let bytes = expr.as_bytes();
        if bytes.len() > kw
            && bytes[..kw].eq_ignore_ascii_case(keyword.as_bytes())
            && bytes[kw].is_ascii_whitespace()
        {
            Some(expr[kw..].trim())
        } else {
            None
        }
    }

    fn strip_suffix_ci<'a>(expr: &'a str, suffix: &str) -> Option<&'a str> {
        let bytes = expr.as_bytes();
        if bytes.len() <= suffix.len() {
            return None;
        }
        let split = bytes.len() - suffix.len();
        if expr.is_char_boundary(split) && bytes[split..].eq_ignore_ascii_case(suffix.as_bytes()) {
            Some(expr[..split].trim())
        } else {
            None
        }
    }

    /// Extract field and values from a `field IN ('a', 'b')` pattern.
    fn extract_in(expr: &str) -> Option<(&str, Vec<String>)> {
        let (field, rest) = Self::split_keyword(expr, "IN")?;
        let list = rest.strip_prefix('(')?.strip_suffix(')')?;
        Some((field, Self::parse_in_values(list)))
    }

    /// Parse comma-separated values in an IN clause.
    fn parse_in_values(s: &str) -> Vec<String> {
        let mut values = Vec::new();
        let mut current = String::new();
        let mut quote: Option<char> = None;

        for c in s.chars() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => current.push(c),
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    ',' => {
                        let trimmed = current.trim();
                        if !trimmed.is_empty() {
                            values.push(trimmed.to_string());
                        }
                        current.clear();
                    }
                    _ => current.push(c),
                },
            }
        }

        let trimmed = current.trim();
        if !trimmed.is_empty() {
            values.push(trimmed.to_string());
        }
        values
    }

    fn evaluate_in(value: &Value, allowed: &[String]) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) => allowed.iter().any(|a| a == s),
            Value::Int64(i) => allowed.iter().any(|a| *a == i.to_string()),
            _ => false,
        }
    }

    fn evaluate_comparison(expr: &str, data: &HashMap<String, Value>) -> Result<bool, EvaluationError> {
        // Longer operators must come first to avoid partial matches.
        let operators: &[(&str, fn(Ordering) -> bool)] = &[
            (">=", |ord| ord != Ordering::Less),
            ("<=", |ord| ord != Ordering::Greater),
            ("!=", |ord| ord != Ordering::Equal),
            ("<>", |ord| ord != Ordering::Equal),
            ("=", |ord| ord == Ordering::Equal),
            (">", |ord| ord == Ordering::Greater),
            ("<", |ord| ord == Ordering::Less),
        ];
        let positions = Self::top_level_positions(expr);

        for (op, predicate) in operators {
            let Some(pos) = positions
                .iter()
                .copied()
                .find(|&i| expr.as_bytes()[i..].starts_with(op.as_bytes()))
            else {
                continue;
            };

            let left = Self::resolve_value(&expr[..pos], data)?;
            let right = Self::resolve_value(&expr[pos + op.len()..], data)?;

            if left.is_null() || right.is_null() {
                return Ok(false);
            }

            return match compare(&left, &right) {
                Some(ord) => Ok(predicate(ord)),
                None => Err(EvaluationError::TypeMismatch {
                    left_type: left.type_name().to_string(),
                    right_type: right.type_name().to_string(),
                }),
            };
        }

        Err(EvaluationError::InvalidSyntax(format!(
            "cannot parse expression: {}",
            expr
        )))
    }

    /// Resolve a value from either a field reference or a literal.
    fn resolve_value(s: &str, data: &HashMap<String, Value>) -> Result<Value, EvaluationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EvaluationError::InvalidSyntax("missing operand".to_string()));
        }

        if s.len() >= 2
            && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
        {
            return Ok(Value::String(s[1..s.len() - 1].to_string()));
        }

        if s.eq_ignore_ascii_case("NULL") {
            return Ok(Value::Null);
        }
        if s.eq_ignore_ascii_case("TRUE") {
            return Ok(Value::Bool(true));
        }
        if s.eq_ignore_ascii_case("FALSE") {
            return Ok(Value::Bool(false));
        }

        if let Ok(i) = s.parse::<i64>() {
            return Ok(Value::Int64(i));
        }
        if let Ok(f) = s.parse::<f64>() {
            return Ok(Value::Float64(f));
        }

        Self::field(s, data).cloned()
    }
}

/// Order two non-null values. Integers and floats compare numerically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
        (Value::Float64(_) | Value::Int64(_), Value::Float64(_) | Value::Int64(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        _ => None,
    }
}
