//! Condition-expression evaluator for formtree schemas.
//!
//! Expressions are JSON values:
//! - Non-array values are literals.
//! - Single-element arrays `[x]` are literal wrappers for `x`.
//! - Multi-element arrays `[operator, ...operands]` dispatch to an operator.
//! - `["$", "ident"]` reads a variable through a caller-supplied resolver.
//!
//! # Example
//!
//! ```
//! use formtree_expression::evaluate_bool;
//! use serde_json::{json, Value};
//!
//! let expr = json!(["==", ["$", "mode"], "fast"]);
//! let met = evaluate_bool(&expr, &mut |ident| {
//!     if ident == "mode" { json!("fast") } else { Value::Null }
//! })
//! .unwrap();
//! assert!(met);
//! ```

pub mod error;
pub mod evaluate;
pub mod util;

pub use error::ExprError;
pub use evaluate::{evaluate, evaluate_bool, references, Resolver};
pub use util::{is_truthy, num};
