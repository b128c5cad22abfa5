//! Error types for the analyzer core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Type analysis errors
    #[error("non-boolean operands cannot be used in logic operations")]
    NonBooleanLogic,

    #[error("non-numeric operands in arithmetic operations")]
    NonNumericArithmetic,

    #[error("non-integer operands in modulo operation")]
    NonIntegerModulo,

    #[error("Cannot compare between {left} and {right}")]
    CannotCompare { left: String, right: String },

    // Cast errors
    #[error("Cannot CAST from {from} to {to}")]
    UncastableTypes { from: String, to: String },

    #[error("Invalid cast")]
    InvalidCast,

    #[error("Cannot group by string columns which are not dictionary encoded")]
    GroupingOnNonDictString,

    #[error("Cannot apply transient dictionary encoding to non-literal expression")]
    TransientDictOnNonLiteral,

    // GROUP BY validation
    #[error(
        "expressions in the SELECT or HAVING clause must be an aggregate function \
         or an expression over GROUP BY columns"
    )]
    GroupByViolation,

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // Feature gaps and internal invariant violations
    #[error("subqueries are not supported in {0}")]
    UnsupportedSubquery(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}
