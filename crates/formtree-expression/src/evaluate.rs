//! Expression evaluation and identifier discovery.

use serde_json::Value;

use crate::error::ExprError;
use crate::util::{cmp, is_truthy, loose_eq};

/// Variable resolver: maps an identifier to its current value. Unresolvable
/// identifiers should yield `Value::Null`.
pub type Resolver<'a> = dyn FnMut(&str) -> Value + 'a;

/// Evaluates an expression against a resolver.
///
/// Non-array values and single-element arrays are literals; longer arrays
/// dispatch on the operator name at index 0.
pub fn evaluate(expr: &Value, resolver: &mut Resolver<'_>) -> Result<Value, ExprError> {
    let arr = match expr {
        Value::Array(arr) if arr.len() >= 2 => arr,
        Value::Array(arr) => {
            // Literal wrapper (or empty array literal).
            return Ok(arr.first().cloned().unwrap_or(Value::Array(Vec::new())));
        }
        other => return Ok(other.clone()),
    };

    let op = match &arr[0] {
        Value::String(s) => s.as_str(),
        _ => return Err(ExprError::UnknownOperator(arr[0].to_string())),
    };
    let operands = &arr[1..];

    match op {
        "$" => {
            require_arity("$", operands.len() == 1, "one")?;
            match &operands[0] {
                Value::String(name) => Ok(resolver(name)),
                _ => Err(ExprError::VarNameNotString),
            }
        }
        "==" | "eq" => binary("==", operands, resolver, |a, b| loose_eq(&a, &b)),
        "!=" | "ne" => binary("!=", operands, resolver, |a, b| !loose_eq(&a, &b)),
        ">" | "gt" => binary(">", operands, resolver, |a, b| {
            cmp(&a, &b) == std::cmp::Ordering::Greater
        }),
        ">=" | "ge" => binary(">=", operands, resolver, |a, b| {
            cmp(&a, &b) != std::cmp::Ordering::Less
        }),
        "<" | "lt" => binary("<", operands, resolver, |a, b| {
            cmp(&a, &b) == std::cmp::Ordering::Less
        }),
        "<=" | "le" => binary("<=", operands, resolver, |a, b| {
            cmp(&a, &b) != std::cmp::Ordering::Greater
        }),
        "&&" | "and" => {
            require_arity("&&", operands.len() >= 2, "at least two")?;
            for operand in operands {
                if !is_truthy(&evaluate(operand, resolver)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "||" | "or" => {
            require_arity("||", operands.len() >= 2, "at least two")?;
            for operand in operands {
                if is_truthy(&evaluate(operand, resolver)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "!" | "not" => {
            require_arity("!", operands.len() == 1, "one")?;
            let v = evaluate(&operands[0], resolver)?;
            Ok(Value::Bool(!is_truthy(&v)))
        }
        "in" => {
            require_arity("in", operands.len() == 2, "two")?;
            let needle = evaluate(&operands[0], resolver)?;
            let haystack = evaluate(&operands[1], resolver)?;
            match haystack {
                Value::Array(items) => {
                    Ok(Value::Bool(items.iter().any(|v| loose_eq(v, &needle))))
                }
                _ => Err(ExprError::InOperandNotArray),
            }
        }
        "defined" => {
            require_arity("defined", operands.len() == 1, "one")?;
            let v = evaluate(&operands[0], resolver)?;
            Ok(Value::Bool(!v.is_null()))
        }
        other => Err(ExprError::UnknownOperator(other.to_string())),
    }
}

/// Evaluates an expression and collapses the result to a boolean.
pub fn evaluate_bool(expr: &Value, resolver: &mut Resolver<'_>) -> Result<bool, ExprError> {
    Ok(is_truthy(&evaluate(expr, resolver)?))
}

/// Every identifier the expression reads, in first-occurrence order,
/// deduplicated. Literal wrappers are opaque and not descended into.
pub fn references(expr: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_references(expr, &mut out);
    out
}

fn collect_references(expr: &Value, out: &mut Vec<String>) {
    let Value::Array(arr) = expr else { return };
    if arr.len() < 2 {
        return;
    }
    if arr.len() == 2 && arr[0].as_str() == Some("$") {
        if let Value::String(name) = &arr[1] {
            if !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
        }
        return;
    }
    for operand in &arr[1..] {
        collect_references(operand, out);
    }
}

fn binary(
    operator: &'static str,
    operands: &[Value],
    resolver: &mut Resolver<'_>,
    f: impl Fn(Value, Value) -> bool,
) -> Result<Value, ExprError> {
    require_arity(operator, operands.len() == 2, "two")?;
    let a = evaluate(&operands[0], resolver)?;
    let b = evaluate(&operands[1], resolver)?;
    Ok(Value::Bool(f(a, b)))
}

fn require_arity(
    operator: &'static str,
    ok: bool,
    expected: &'static str,
) -> Result<(), ExprError> {
    if ok {
        Ok(())
    } else {
        Err(ExprError::Arity { operator, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve_none(_: &str) -> Value {
        Value::Null
    }

    #[test]
    fn literals_pass_through() {
        let mut r = resolve_none;
        assert_eq!(evaluate(&json!(true), &mut r).unwrap(), json!(true));
        assert_eq!(evaluate(&json!("x"), &mut r).unwrap(), json!("x"));
        // Single-element array is a literal wrapper.
        assert_eq!(evaluate(&json!([["$", "a"]]), &mut r).unwrap(), json!(["$", "a"]));
    }

    #[test]
    fn variable_reads_through_resolver() {
        let mut r = |name: &str| if name == "b" { json!(1) } else { Value::Null };
        assert!(evaluate_bool(&json!(["==", ["$", "b"], 1]), &mut r).unwrap());
        assert!(!evaluate_bool(&json!(["==", ["$", "missing"], 1]), &mut r).unwrap());
    }

    #[test]
    fn and_or_short_circuit_over_truthiness() {
        let mut r = resolve_none;
        assert!(evaluate_bool(&json!(["&&", 1, "x", true]), &mut r).unwrap());
        assert!(!evaluate_bool(&json!(["and", 1, 0]), &mut r).unwrap());
        assert!(evaluate_bool(&json!(["||", 0, "", "x"]), &mut r).unwrap());
        assert!(!evaluate_bool(&json!(["or", 0, ""]), &mut r).unwrap());
    }

    #[test]
    fn in_tests_membership() {
        let mut r = |_: &str| json!("b");
        assert!(evaluate_bool(&json!(["in", ["$", "x"], [["a", "b", "c"]]]), &mut r).unwrap());
        assert!(!evaluate_bool(&json!(["in", ["$", "x"], [["d"]]]), &mut r).unwrap());
        assert_eq!(
            evaluate(&json!(["in", 1, 2]), &mut r),
            Err(ExprError::InOperandNotArray)
        );
    }

    #[test]
    fn defined_distinguishes_null() {
        let mut r = |name: &str| if name == "a" { json!(0) } else { Value::Null };
        assert!(evaluate_bool(&json!(["defined", ["$", "a"]]), &mut r).unwrap());
        assert!(!evaluate_bool(&json!(["defined", ["$", "z"]]), &mut r).unwrap());
    }

    #[test]
    fn references_are_deduplicated_in_order() {
        let expr = json!(["&&", ["==", ["$", "b"], 1], ["||", ["$", "a"], ["$", "b"]]]);
        assert_eq!(references(&expr), vec!["b".to_string(), "a".to_string()]);
        // Literal wrappers are not descended into.
        assert!(references(&json!([["$", "a"]])).is_empty());
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let mut r = resolve_none;
        assert_eq!(
            evaluate(&json!(["**", 1, 2]), &mut r),
            Err(ExprError::UnknownOperator("**".to_string()))
        );
    }
}
