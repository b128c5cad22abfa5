//! Query-shape containers: targetlists, range tables, and the analyzed query
//! handed to the planner
//!
//! A `Query` exclusively owns every node reachable from it; range table
//! entries own their expanded column sets and any view subquery, and set
//! operations chain through `next_query` like a singly-linked list.

use crate::types::expression::Expr;
use crate::types::schema::{Catalog, ColumnDescriptor, TableDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One projected item of a query or plan node.
#[derive(Debug, Serialize, Deserialize)]
pub struct TargetEntry {
    pub resname: String,
    pub expr: Expr,
    pub unnest: bool,
}

impl TargetEntry {
    pub fn new(resname: impl Into<String>, expr: Expr, unnest: bool) -> Self {
        Self { resname: resname.into(), expr, unnest }
    }
}

impl fmt::Display for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.resname, self.expr)?;
        if self.unnest {
            write!(f, " UNNEST")?;
        }
        write!(f, ")")
    }
}

/// One ORDER BY item, referencing a targetlist entry by 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub tle_no: usize,
    pub is_desc: bool,
    pub nulls_first: bool,
}

impl fmt::Display for OrderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tle_no)?;
        if self.is_desc {
            write!(f, " desc")?;
        }
        if self.nulls_first {
            write!(f, " nulls first")?;
        }
        Ok(())
    }
}

/// One FROM-clause source plus its loaded column descriptors.
#[derive(Debug, Serialize, Deserialize)]
pub struct RangeTableEntry {
    pub rangevar: String,
    pub table: TableDescriptor,
    pub column_descs: Vec<ColumnDescriptor>,
    pub view_query: Option<Box<Query>>,
}

impl RangeTableEntry {
    pub fn new(rangevar: impl Into<String>, table: TableDescriptor) -> Self {
        Self { rangevar: rangevar.into(), table, column_descs: Vec::new(), view_query: None }
    }

    pub fn view(rangevar: impl Into<String>, table: TableDescriptor, view_query: Query) -> Self {
        Self {
            rangevar: rangevar.into(),
            table,
            column_descs: Vec::new(),
            view_query: Some(Box::new(view_query)),
        }
    }

    /// Load the full column set, system columns included.
    pub fn add_all_column_descs(&mut self, catalog: &dyn Catalog) {
        self.column_descs = catalog.get_all_column_metadata(self.table.table_id, true, true);
    }

    /// Append one target entry per user column, binding each to `rte_idx`.
    pub fn expand_star_in_targetlist(
        &mut self,
        catalog: &dyn Catalog,
        tlist: &mut Vec<TargetEntry>,
        rte_idx: i32,
    ) {
        self.column_descs = catalog.get_all_column_metadata(self.table.table_id, false, true);
        for cd in &self.column_descs {
            let cv = Expr::column(cd.column_type, self.table.table_id, cd.column_id, rte_idx);
            tlist.push(TargetEntry::new(cd.column_name.clone(), cv, false));
        }
    }

    /// Descriptor of a column by name, fetching and caching it on a miss.
    pub fn get_column_desc(
        &mut self,
        catalog: &dyn Catalog,
        name: &str,
    ) -> Option<&ColumnDescriptor> {
        if let Some(pos) = self.column_descs.iter().position(|cd| cd.column_name == name) {
            return Some(&self.column_descs[pos]);
        }
        let cd = catalog.get_metadata_for_column(self.table.table_id, name)?;
        self.column_descs.push(cd);
        self.column_descs.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtType {
    Select,
    Insert,
    Update,
    Delete,
}

/// A fully analyzed statement.
#[derive(Debug, Serialize, Deserialize)]
pub struct Query {
    pub stmt_type: StmtType,
    pub is_distinct: bool,
    pub targetlist: Vec<TargetEntry>,
    pub rangetable: Vec<RangeTableEntry>,
    pub where_predicate: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having_predicate: Option<Expr>,
    pub order_by: Vec<OrderEntry>,
    /// Next statement in a set-operation chain.
    pub next_query: Option<Box<Query>>,
    /// UNION ALL vs. UNION for the `next_query` link.
    pub is_unionall: bool,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Query {
    pub fn new(stmt_type: StmtType) -> Self {
        Self {
            stmt_type,
            is_distinct: false,
            targetlist: Vec::new(),
            rangetable: Vec::new(),
            where_predicate: None,
            group_by: Vec::new(),
            having_predicate: None,
            order_by: Vec::new(),
            next_query: None,
            is_unionall: false,
            limit: None,
            offset: 0,
        }
    }

    /// 0-based position of the range table entry named `name`, −1 if absent.
    pub fn get_rte_idx(&self, name: &str) -> i32 {
        for (idx, rte) in self.rangetable.iter().enumerate() {
            if rte.rangevar == name {
                return idx as i32;
            }
        }
        -1
    }

    pub fn add_rte(&mut self, rte: RangeTableEntry) {
        self.rangetable.push(rte);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::types::data_type::TypeInfo;

    /// In-memory catalog fixture for analyzer tests.
    pub struct MemoryCatalog {
        pub tables: Vec<(TableDescriptor, Vec<ColumnDescriptor>)>,
    }

    impl MemoryCatalog {
        pub fn new() -> Self {
            Self { tables: Vec::new() }
        }

        pub fn add_table(&mut self, table_id: i32, name: &str, columns: &[(&str, TypeInfo)]) {
            let td = TableDescriptor { table_id, table_name: name.to_string() };
            let mut cds = vec![ColumnDescriptor {
                table_id,
                column_id: 0,
                column_name: "rowid".to_string(),
                column_type: TypeInfo::new(crate::types::data_type::SqlType::BigInt),
                is_system: true,
                is_deleted: false,
            }];
            for (i, (cname, ti)) in columns.iter().enumerate() {
                cds.push(ColumnDescriptor {
                    table_id,
                    column_id: (i + 1) as i32,
                    column_name: cname.to_string(),
                    column_type: *ti,
                    is_system: false,
                    is_deleted: false,
                });
            }
            self.tables.push((td, cds));
        }

        pub fn table_desc(&self, table_id: i32) -> TableDescriptor {
            self.tables
                .iter()
                .find(|(td, _)| td.table_id == table_id)
                .map(|(td, _)| td.clone())
                .expect("unknown table id")
        }
    }

    impl Catalog for MemoryCatalog {
        fn get_all_column_metadata(
            &self,
            table_id: i32,
            include_system: bool,
            include_deleted: bool,
        ) -> Vec<ColumnDescriptor> {
            self.tables
                .iter()
                .filter(|(td, _)| td.table_id == table_id)
                .flat_map(|(_, cds)| cds.iter())
                .filter(|cd| (include_system || !cd.is_system) && (include_deleted || !cd.is_deleted))
                .cloned()
                .collect()
        }

        fn get_metadata_for_column(&self, table_id: i32, name: &str) -> Option<ColumnDescriptor> {
            self.tables
                .iter()
                .filter(|(td, _)| td.table_id == table_id)
                .flat_map(|(_, cds)| cds.iter())
                .find(|cd| cd.column_name == name)
                .cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryCatalog;
    use super::*;
    use crate::types::data_type::{SqlType, TypeInfo};
    use crate::types::expression::ExprKind;

    fn fixture() -> (MemoryCatalog, Query) {
        let mut catalog = MemoryCatalog::new();
        catalog.add_table(
            1,
            "events",
            &[
                ("id", TypeInfo::with_notnull(SqlType::Int, true)),
                ("name", TypeInfo::new(SqlType::Text)),
            ],
        );
        catalog.add_table(2, "users", &[("id", TypeInfo::with_notnull(SqlType::Int, true))]);

        let mut query = Query::new(StmtType::Select);
        query.add_rte(RangeTableEntry::new("events", catalog.table_desc(1)));
        query.add_rte(RangeTableEntry::new("u", catalog.table_desc(2)));
        (catalog, query)
    }

    #[test]
    fn rte_lookup_is_positional() {
        let (_, query) = fixture();
        assert_eq!(query.get_rte_idx("events"), 0);
        assert_eq!(query.get_rte_idx("u"), 1);
        assert_eq!(query.get_rte_idx("missing"), -1);
    }

    #[test]
    fn star_expansion_skips_system_columns() {
        let (catalog, mut query) = fixture();
        let mut tlist = Vec::new();
        query.rangetable[0].expand_star_in_targetlist(&catalog, &mut tlist, 0);
        let names: Vec<_> = tlist.iter().map(|tle| tle.resname.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        for (i, tle) in tlist.iter().enumerate() {
            match &tle.expr.kind {
                ExprKind::Column(cv) => {
                    assert_eq!(cv.table_id, 1);
                    assert_eq!(cv.column_id, (i + 1) as i32);
                    assert_eq!(cv.rte_idx, 0);
                }
                other => panic!("expected a column reference, found {:?}", other),
            }
            assert!(!tle.unnest);
        }
    }

    #[test]
    fn all_column_descs_include_system() {
        let (catalog, mut query) = fixture();
        query.rangetable[0].add_all_column_descs(&catalog);
        assert_eq!(query.rangetable[0].column_descs.len(), 3);
        assert!(query.rangetable[0].column_descs.iter().any(|cd| cd.is_system));
    }

    #[test]
    fn column_desc_lookup_caches() {
        let (catalog, mut query) = fixture();
        let rte = &mut query.rangetable[0];
        assert!(rte.column_descs.is_empty());
        let cd = rte.get_column_desc(&catalog, "name").expect("column exists");
        assert_eq!(cd.column_id, 2);
        assert_eq!(rte.column_descs.len(), 1);
        // Second lookup is served from the cache.
        let cd2 = rte.get_column_desc(&catalog, "name").expect("column cached");
        assert_eq!(cd2.column_id, 2);
        assert_eq!(rte.column_descs.len(), 1);
        assert!(rte.get_column_desc(&catalog, "missing").is_none());
    }
}
