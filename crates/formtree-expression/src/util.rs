//! Coercion helpers shared by the operator implementations.

use serde_json::Value;

/// JS-style truthiness: null, false, 0, NaN and "" are false, everything
/// else (including empty containers) is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerces a value to a number; non-numeric shapes collapse to 0.
pub fn num(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Loose equality: numbers compare by numeric value (so `1` equals `1.0`),
/// everything else by deep equality.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => num(a) == num(b),
        _ => a == b,
    }
}

/// Three-way comparison: numeric when either side is a number, else
/// lexicographic over the string renderings.
pub fn cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            num(a).partial_cmp(&num(b)).unwrap_or(std::cmp::Ordering::Equal)
        }
        _ => str_val(a).cmp(&str_val(b)),
    }
}

fn str_val(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
