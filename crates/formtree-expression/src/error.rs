use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("\"{operator}\" operator expects {expected} operands")]
    Arity {
        operator: &'static str,
        expected: &'static str,
    },

    #[error("variable name must be a string")]
    VarNameNotString,

    #[error("\"in\" operator expects an array operand")]
    InOperandNotArray,
}
