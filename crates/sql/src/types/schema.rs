//! Catalog-facing types: table and column descriptors, and the lookup
//! capability the analyzer consumes
//!
//! The catalog itself lives outside this crate; the analyzer only reads
//! metadata through the [`Catalog`] trait and never mutates it.

use crate::types::data_type::TypeInfo;
use serde::{Deserialize, Serialize};

/// A FROM-clause source as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_id: i32,
    pub table_name: String,
}

/// One column of a table, with its analyzed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table_id: i32,
    pub column_id: i32,
    pub column_name: String,
    pub column_type: TypeInfo,
    pub is_system: bool,
    pub is_deleted: bool,
}

/// Read-only metadata lookups. Implementations must be safe for concurrent
/// reads when queries are analyzed on separate threads.
pub trait Catalog {
    /// All column descriptors of a table, optionally including system and
    /// soft-deleted columns, in column-id order.
    fn get_all_column_metadata(
        &self,
        table_id: i32,
        include_system: bool,
        include_deleted: bool,
    ) -> Vec<ColumnDescriptor>;

    /// Descriptor of a single column by name, if it exists.
    fn get_metadata_for_column(&self, table_id: i32, name: &str) -> Option<ColumnDescriptor>;
}
