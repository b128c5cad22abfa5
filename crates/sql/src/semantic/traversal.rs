//! Uniform recursive passes over the expression tree
//!
//! Visit order is deterministic: left before right for binary operators,
//! when-list order for CASE, pattern before escape for LIKE.

use crate::error::{Error, Result};
use crate::types::data_type::SqlType;
use crate::types::expression::{Expr, ExprKind, UnaryOp, WhichRow};
use std::collections::{BTreeMap, BTreeSet};

/// Collected column references, ordered and deduplicated by
/// `(table_id, column_id)`; the first occurrence wins.
pub type ColumnVarSet<'a> = BTreeMap<(i32, i32), &'a Expr>;

impl Expr {
    /// Union of the `rte_idx` values of all column references in the subtree.
    pub fn collect_rte_idx(&self, rte_idx_set: &mut BTreeSet<i32>) {
        match &self.kind {
            ExprKind::Column(cv) => {
                rte_idx_set.insert(cv.rte_idx);
            }
            ExprKind::Var { col, .. } => {
                rte_idx_set.insert(col.rte_idx);
            }
            ExprKind::Constant { .. } | ExprKind::Subquery { .. } => {}
            ExprKind::Unary { operand, .. } => operand.collect_rte_idx(rte_idx_set),
            ExprKind::Binary { left, right, .. } => {
                left.collect_rte_idx(rte_idx_set);
                right.collect_rte_idx(rte_idx_set);
            }
            ExprKind::InValues { arg, values } => {
                arg.collect_rte_idx(rte_idx_set);
                for v in values {
                    v.collect_rte_idx(rte_idx_set);
                }
            }
            ExprKind::CharLength { arg, .. } => arg.collect_rte_idx(rte_idx_set),
            ExprKind::Like { arg, pattern, escape, .. } => {
                arg.collect_rte_idx(rte_idx_set);
                pattern.collect_rte_idx(rte_idx_set);
                if let Some(e) = escape {
                    e.collect_rte_idx(rte_idx_set);
                }
            }
            ExprKind::Agg { arg, .. } => {
                if let Some(a) = arg {
                    a.collect_rte_idx(rte_idx_set);
                }
            }
            ExprKind::Case { branches, else_expr } => {
                for (when, then) in branches {
                    when.collect_rte_idx(rte_idx_set);
                    then.collect_rte_idx(rte_idx_set);
                }
                if let Some(e) = else_expr {
                    e.collect_rte_idx(rte_idx_set);
                }
            }
            ExprKind::Extract { from, .. } | ExprKind::DateTrunc { from, .. } => {
                from.collect_rte_idx(rte_idx_set)
            }
        }
    }

    /// Collect the column-reference nodes of the subtree. With
    /// `include_agg = false` the walk does not descend into aggregates.
    pub fn collect_column_var<'a>(&'a self, colvar_set: &mut ColumnVarSet<'a>, include_agg: bool) {
        match &self.kind {
            ExprKind::Column(cv) => {
                colvar_set.entry((cv.table_id, cv.column_id)).or_insert(self);
            }
            ExprKind::Var { col, .. } => {
                colvar_set.entry((col.table_id, col.column_id)).or_insert(self);
            }
            ExprKind::Constant { .. } | ExprKind::Subquery { .. } => {}
            ExprKind::Unary { operand, .. } => operand.collect_column_var(colvar_set, include_agg),
            ExprKind::Binary { left, right, .. } => {
                left.collect_column_var(colvar_set, include_agg);
                right.collect_column_var(colvar_set, include_agg);
            }
            ExprKind::InValues { arg, values } => {
                arg.collect_column_var(colvar_set, include_agg);
                for v in values {
                    v.collect_column_var(colvar_set, include_agg);
                }
            }
            ExprKind::CharLength { arg, .. } => arg.collect_column_var(colvar_set, include_agg),
            ExprKind::Like { arg, pattern, escape, .. } => {
                arg.collect_column_var(colvar_set, include_agg);
                pattern.collect_column_var(colvar_set, include_agg);
                if let Some(e) = escape {
                    e.collect_column_var(colvar_set, include_agg);
                }
            }
            ExprKind::Agg { arg, .. } => {
                if include_agg {
                    if let Some(a) = arg {
                        a.collect_column_var(colvar_set, include_agg);
                    }
                }
            }
            ExprKind::Case { branches, else_expr } => {
                for (when, then) in branches {
                    when.collect_column_var(colvar_set, include_agg);
                    then.collect_column_var(colvar_set, include_agg);
                }
                if let Some(e) = else_expr {
                    e.collect_column_var(colvar_set, include_agg);
                }
            }
            ExprKind::Extract { from, .. } | ExprKind::DateTrunc { from, .. } => {
                from.collect_column_var(colvar_set, include_agg)
            }
        }
    }

    /// Append `self` to `expr_list` unless an equal expression is present.
    pub fn add_unique<'a>(&'a self, expr_list: &mut Vec<&'a Expr>) {
        for e in expr_list.iter() {
            if **e == *self {
                return;
            }
        }
        expr_list.push(self);
    }

    /// Collect unique descendants satisfying `f`, stopping descent at the
    /// first match along each branch.
    pub fn find_expr<'a>(&'a self, f: &dyn Fn(&Expr) -> bool, expr_list: &mut Vec<&'a Expr>) {
        if f(self) {
            self.add_unique(expr_list);
            return;
        }
        match &self.kind {
            ExprKind::Column(_)
            | ExprKind::Var { .. }
            | ExprKind::Constant { .. }
            | ExprKind::Subquery { .. } => {}
            ExprKind::Unary { operand, .. } => operand.find_expr(f, expr_list),
            ExprKind::Binary { left, right, .. } => {
                left.find_expr(f, expr_list);
                right.find_expr(f, expr_list);
            }
            ExprKind::InValues { arg, values } => {
                arg.find_expr(f, expr_list);
                for v in values {
                    v.find_expr(f, expr_list);
                }
            }
            ExprKind::CharLength { arg, .. } => arg.find_expr(f, expr_list),
            ExprKind::Like { arg, pattern, escape, .. } => {
                arg.find_expr(f, expr_list);
                pattern.find_expr(f, expr_list);
                if let Some(e) = escape {
                    e.find_expr(f, expr_list);
                }
            }
            ExprKind::Agg { arg, .. } => {
                if let Some(a) = arg {
                    a.find_expr(f, expr_list);
                }
            }
            ExprKind::Case { branches, else_expr } => {
                for (when, then) in branches {
                    when.find_expr(f, expr_list);
                    then.find_expr(f, expr_list);
                }
                if let Some(e) = else_expr {
                    e.find_expr(f, expr_list);
                }
            }
            ExprKind::Extract { from, .. } | ExprKind::DateTrunc { from, .. } => {
                from.find_expr(f, expr_list)
            }
        }
    }

    /// Verify that every free column reference in the subtree appears in the
    /// GROUP BY list; aggregates shield their arguments. `Var` slots are
    /// only legal here when they point at the group-by row.
    pub fn check_group_by(&self, group_by: &[Expr]) -> Result<()> {
        match &self.kind {
            ExprKind::Column(cv) => {
                for g in group_by {
                    if let Some(gcv) = g.as_column_var() {
                        if cv.table_id == gcv.table_id && cv.column_id == gcv.column_id {
                            return Ok(());
                        }
                    }
                }
                Err(Error::GroupByViolation)
            }
            ExprKind::Var { which_row, .. } => {
                if *which_row != WhichRow::GroupBy {
                    return Err(Error::Internal("invalid VAR in GROUP BY or HAVING".into()));
                }
                Ok(())
            }
            ExprKind::Unary { operand, .. } => operand.check_group_by(group_by),
            ExprKind::Binary { left, right, .. } => {
                left.check_group_by(group_by)?;
                right.check_group_by(group_by)
            }
            ExprKind::Case { branches, else_expr } => {
                for (when, then) in branches {
                    when.check_group_by(group_by)?;
                    then.check_group_by(group_by)?;
                }
                if let Some(e) = else_expr {
                    e.check_group_by(group_by)?;
                }
                Ok(())
            }
            ExprKind::Extract { from, .. } | ExprKind::DateTrunc { from, .. } => {
                from.check_group_by(group_by)
            }
            // Aggregates shield their arguments; the remaining variants carry
            // no free columns of their own.
            _ => Ok(()),
        }
    }

    /// Best-effort domain of a CASE tree: the set of constant or column
    /// results (or casts of either) it can produce. An opaque branch leaves
    /// the set empty to signal "unknown domain".
    pub fn get_domain<'a>(&'a self, domain_set: &mut Vec<&'a Expr>) {
        match &self.kind {
            ExprKind::Case { branches, else_expr } => {
                for (_, then) in branches {
                    if let Some(candidate) = domain_candidate(then) {
                        candidate.add_unique(domain_set);
                    } else {
                        then.get_domain(domain_set);
                        if domain_set.is_empty() {
                            return;
                        }
                    }
                }
                if let Some(e) = else_expr {
                    if let Some(candidate) = domain_candidate(e) {
                        candidate.add_unique(domain_set);
                    } else if !matches!(e.kind, ExprKind::Unary { op: UnaryOp::Cast, .. }) {
                        e.get_domain(domain_set);
                    }
                }
            }
            _ => domain_set.clear(),
        }
    }

    /// Whether the node is a bare boolean column usable as a predicate.
    pub(crate) fn is_boolean_column(&self) -> bool {
        matches!(self.kind, ExprKind::Column(_)) && self.type_info.kind == SqlType::Bool
    }
}

/// A CASE result contributes to the domain when it is a constant, a column
/// reference, or a cast of one of those.
fn domain_candidate(e: &Expr) -> Option<&Expr> {
    match &e.kind {
        ExprKind::Constant { .. } | ExprKind::Column(_) | ExprKind::Var { .. } => Some(e),
        ExprKind::Unary { op: UnaryOp::Cast, operand } => match &operand.kind {
            ExprKind::Constant { .. } | ExprKind::Column(_) | ExprKind::Var { .. } => Some(e),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_type::TypeInfo;
    use crate::types::datum::Datum;
    use crate::types::expression::{AggKind, BinaryOp, Qualifier, UnaryOp};

    fn int_ti() -> TypeInfo {
        TypeInfo::new(SqlType::Int)
    }

    fn col(table: i32, column: i32, rte: i32) -> Expr {
        Expr::column(int_ti(), table, column, rte)
    }

    fn int_const(v: i32) -> Expr {
        Expr::constant(int_ti(), Datum::Int(v))
    }

    fn eq(l: Expr, r: Expr) -> Expr {
        Expr::binary(TypeInfo::new(SqlType::Bool), BinaryOp::Eq, Qualifier::One, l, r)
    }

    fn and(l: Expr, r: Expr) -> Expr {
        Expr::binary(TypeInfo::new(SqlType::Bool), BinaryOp::And, Qualifier::One, l, r)
    }

    #[test]
    fn rte_collection_unions_all_references() {
        let e = and(eq(col(1, 1, 0), Expr::column(int_ti(), 2, 1, 1)), eq(col(1, 2, 0), int_const(5)));
        let mut set = BTreeSet::new();
        e.collect_rte_idx(&mut set);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn column_var_collection_dedups_and_orders() {
        let e = and(
            eq(col(2, 5, 1), col(1, 9, 0)),
            eq(col(1, 9, 0), col(1, 2, 0)),
        );
        let mut set = ColumnVarSet::new();
        e.collect_column_var(&mut set, true);
        let keys: Vec<_> = set.keys().copied().collect();
        assert_eq!(keys, vec![(1, 2), (1, 9), (2, 5)]);
    }

    #[test]
    fn column_var_collection_stops_at_aggregates() {
        let agg = Expr::agg(TypeInfo::new(SqlType::BigInt), AggKind::Sum, Some(col(1, 3, 0)), false);
        let e = eq(agg, int_const(10));
        let mut without = ColumnVarSet::new();
        e.collect_column_var(&mut without, false);
        assert!(without.is_empty());
        let mut with = ColumnVarSet::new();
        e.collect_column_var(&mut with, true);
        assert_eq!(with.len(), 1);
    }

    #[test]
    fn find_expr_stops_at_first_match_and_dedups() {
        let tree = and(eq(col(1, 1, 0), int_const(5)), eq(col(1, 1, 0), int_const(5)));
        let mut found = Vec::new();
        tree.find_expr(&|e| matches!(e.kind, ExprKind::Column(_)), &mut found);
        // The two structurally equal columns dedup to one entry.
        assert_eq!(found.len(), 1);

        // Matching the comparison stops descent before the columns.
        let mut found = Vec::new();
        tree.find_expr(
            &|e| matches!(&e.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }),
            &mut found,
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn check_group_by_accepts_grouped_columns() {
        let group_by = vec![col(1, 1, 0)];
        let e = eq(col(1, 1, 0), int_const(5));
        assert!(e.check_group_by(&group_by).is_ok());

        // An aggregate shields its argument.
        let shielded = Expr::agg(
            TypeInfo::new(SqlType::BigInt),
            AggKind::Sum,
            Some(col(1, 7, 0)),
            false,
        );
        assert!(shielded.check_group_by(&group_by).is_ok());
    }

    #[test]
    fn check_group_by_rejects_free_columns() {
        let group_by = vec![col(1, 1, 0)];
        let e = eq(col(1, 2, 0), int_const(5));
        assert_eq!(e.check_group_by(&group_by).unwrap_err(), Error::GroupByViolation);

        // An empty GROUP BY list rejects any column.
        assert_eq!(col(1, 1, 0).check_group_by(&[]).unwrap_err(), Error::GroupByViolation);
    }

    #[test]
    fn check_group_by_vars_must_point_at_group_row() {
        let ok = Expr::slot_var(int_ti(), WhichRow::GroupBy, 1);
        assert!(ok.check_group_by(&[]).is_ok());
        let bad = Expr::slot_var(int_ti(), WhichRow::InputOuter, 1);
        assert!(matches!(bad.check_group_by(&[]), Err(Error::Internal(_))));
    }

    #[test]
    fn case_domain_collects_result_candidates() {
        let cond = eq(col(1, 1, 0), int_const(1));
        let cast_const = Expr::new(
            TypeInfo::new(SqlType::BigInt),
            false,
            ExprKind::Unary { op: UnaryOp::Cast, operand: Box::new(int_const(3)) },
        );
        let case = Expr::case(
            int_ti(),
            vec![(cond, int_const(1)), (eq(col(1, 1, 0), int_const(2)), cast_const)],
            Some(int_const(9)),
        );
        let mut domain = Vec::new();
        case.get_domain(&mut domain);
        assert_eq!(domain.len(), 3);
    }

    #[test]
    fn opaque_case_branch_empties_the_domain() {
        let cond = eq(col(1, 1, 0), int_const(1));
        let opaque = Expr::binary(
            int_ti(),
            BinaryOp::Plus,
            Qualifier::One,
            col(1, 2, 0),
            int_const(1),
        );
        let case = Expr::case(int_ti(), vec![(cond, int_const(1)), (eq(col(1, 1, 0), int_const(2)), opaque)], None);
        let mut domain = Vec::new();
        case.get_domain(&mut domain);
        assert!(domain.is_empty());
    }

    #[test]
    fn duplicate_case_results_dedup() {
        let case = Expr::case(
            int_ti(),
            vec![
                (eq(col(1, 1, 0), int_const(1)), int_const(7)),
                (eq(col(1, 1, 0), int_const(2)), int_const(7)),
            ],
            Some(int_const(7)),
        );
        let mut domain = Vec::new();
        case.get_domain(&mut domain);
        assert_eq!(domain.len(), 1);
    }
}
