//! The analyzed data model: SQL types, datums, expression nodes, and the
//! query-shape containers handed to the planner.

pub mod data_type;
pub mod datum;
pub mod expression;
pub mod query;
pub mod schema;

pub use data_type::{Compression, SqlType, TypeInfo};
pub use datum::Datum;
pub use expression::Expr;
pub use query::Query;
