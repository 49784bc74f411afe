// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Condition evaluation for `next` transitions.
//!
//! Grammar: `{{ <path> }}` (truthiness) or `{{ <path> <op> <literal> }}`
//! with `op ∈ {==, !=, >=, <=, >, <}`. The literal is coerced to the
//! runtime type of the left-hand value. Unknown paths resolve to null and
//! every comparison involving null is false. A malformed expression is
//! false and logged — it never aborts the orchestrator.

use rein_flow::{ElseSpec, NextSpec};
use serde_json::Value;
use tracing::warn;

// Two-char operators first so `>=` is not split as `>`.
const OPS: &[&str] = &["==", "!=", ">=", "<=", ">", "<"];

/// Evaluate one `{{ expr }}` condition against result data.
pub fn evaluate(expr: &str, data: &Value) -> bool {
    let trimmed = expr.trim();
    let Some(inner) = trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
    else {
        warn!(expr, "condition is not a {{{{ … }}}} expression");
        return false;
    };
    let inner = inner.trim();
    if inner.is_empty() {
        warn!(expr, "empty condition");
        return false;
    }

    for op in OPS {
        if let Some((lhs, rhs)) = inner.split_once(op) {
            let left = resolve_path(lhs.trim(), data);
            return compare(left, op, strip_quotes(rhs.trim()));
        }
    }

    truthy(resolve_path(inner, data))
}

/// Pick the target of a `next` spec, if any rule matches.
pub fn select_next_target(next: &NextSpec, data: &Value) -> Option<String> {
    match next {
        NextSpec::Name(name) => Some(name.clone()),
        NextSpec::Conditions(rules) => {
            for rule in rules {
                // An else rule always matches when reached.
                if let Some(otherwise) = &rule.otherwise {
                    return rule.goto.clone().or(match otherwise {
                        ElseSpec::Target(target) => Some(target.clone()),
                        ElseSpec::Flag(_) => None,
                    });
                }
                if let Some(condition) = &rule.condition {
                    if evaluate(condition, data) {
                        return rule.goto.clone();
                    }
                }
            }
            None
        }
    }
}

/// Resolve a dotted path (`result.review.approved`) into the data.
fn resolve_path(path: &str, data: &Value) -> Option<Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current.clone())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')).unwrap_or(s);
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn truthy(value: Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn compare(left: Option<Value>, op: &str, right: &str) -> bool {
    let Some(left) = left else {
        return false;
    };

    match left {
        Value::Bool(l) => {
            let r = matches!(right.to_lowercase().as_str(), "true" | "1" | "yes");
            apply_eq(op, l == r)
        }
        Value::Number(n) => {
            let Some(l) = n.as_f64() else { return false };
            let Ok(r) = right.parse::<f64>() else {
                // Type mismatch: only inequality can hold.
                return op == "!=";
            };
            apply_ord(op, l, r)
        }
        Value::String(l) => match op {
            "==" => l == right,
            "!=" => l != right,
            ">" => l.as_str() > right,
            "<" => l.as_str() < right,
            ">=" => l.as_str() >= right,
            "<=" => l.as_str() <= right,
            _ => false,
        },
        Value::Null => false,
        // Containers support equality against JSON literals only.
        other => {
            let Ok(r) = serde_json::from_str::<Value>(right) else {
                return op == "!=";
            };
            apply_eq(op, other == r)
        }
    }
}

fn apply_eq(op: &str, equal: bool) -> bool {
    match op {
        "==" => equal,
        "!=" => !equal,
        _ => false,
    }
}

fn apply_ord(op: &str, l: f64, r: f64) -> bool {
    match op {
        "==" => l == r,
        "!=" => l != r,
        ">" => l > r,
        "<" => l < r,
        ">=" => l >= r,
        "<=" => l <= r,
        _ => false,
    }
}

#[cfg(test)]
#[path = "cond_tests.rs"]
mod tests;
