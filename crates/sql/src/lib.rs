//! Semantic analyzer core for the silica SQL engine
//!
//! This crate owns the typed expression tree produced by the parser and the
//! transformations applied to it before physical planning:
//! - type inference and coercion insertion for binary operations
//! - constant folding of casts, including dictionary-encoded string casts
//! - predicate classification into scan / join / constant buckets
//! - targetlist and aggregate rewrites across plan boundaries
//!
//! Parsing, the catalog service, planning and execution live elsewhere; the
//! catalog and the string/datum codec are consumed through traits.

pub mod codec;
mod error;
pub mod semantic;
pub mod types;

pub use codec::{DatumCodec, TextCodec};
pub use error::{Error, Result};
pub use types::data_type::{transient_dict, Compression, SqlType, TypeInfo, TRANSIENT_DICT_ID};
pub use types::datum::Datum;
pub use types::expression::{
    AggKind, BinaryOp, ColumnVar, DateTimeField, Expr, ExprKind, Qualifier, UnaryOp, WhichRow,
};
pub use types::query::{OrderEntry, Query, RangeTableEntry, StmtType, TargetEntry};
pub use types::schema::{Catalog, ColumnDescriptor, TableDescriptor};
