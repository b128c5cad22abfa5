//! Expression rewrites across plan boundaries
//!
//! Each pass produces a fresh tree with column and aggregate references
//! re-targeted against a supplied targetlist, preserving `type_info` and
//! `contains_agg` on every node it emits. A reference the targetlist cannot
//! satisfy is an analyzer bug and reported as `Error::Internal`.

use crate::error::{Error, Result};
use crate::types::expression::{Expr, ExprKind, WhichRow};
use crate::types::query::TargetEntry;

impl Expr {
    /// Replace column references with deep copies of their targetlist
    /// counterparts (matched by table and column id); aggregates must appear
    /// in the targetlist by structural equality.
    pub fn rewrite_with_targetlist(&self, tlist: &[TargetEntry]) -> Result<Expr> {
        match &self.kind {
            ExprKind::Column(cv) => {
                for tle in tlist {
                    if let Some(colvar) = tle.expr.as_column_var() {
                        if cv.table_id == colvar.table_id && cv.column_id == colvar.column_id {
                            return Ok(tle.expr.deep_copy());
                        }
                    }
                }
                Err(Error::Internal("cannot find ColumnVar in targetlist".into()))
            }
            ExprKind::Agg { .. } => {
                for tle in tlist {
                    if matches!(tle.expr.kind, ExprKind::Agg { .. }) && *self == tle.expr {
                        return Ok(tle.expr.deep_copy());
                    }
                }
                Err(Error::Internal("cannot find AggExpr in targetlist".into()))
            }
            ExprKind::Unary { op, operand } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Unary {
                    op: *op,
                    operand: Box::new(operand.rewrite_with_targetlist(tlist)?),
                },
            )),
            ExprKind::Binary { op, qualifier, left, right } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Binary {
                    op: *op,
                    qualifier: *qualifier,
                    left: Box::new(left.rewrite_with_targetlist(tlist)?),
                    right: Box::new(right.rewrite_with_targetlist(tlist)?),
                },
            )),
            ExprKind::InValues { arg, values } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::InValues {
                    arg: Box::new(arg.rewrite_with_targetlist(tlist)?),
                    values: values.iter().map(Expr::deep_copy).collect(),
                },
            )),
            ExprKind::CharLength { arg, calc_encoded_length } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::CharLength {
                    arg: Box::new(arg.rewrite_with_targetlist(tlist)?),
                    calc_encoded_length: *calc_encoded_length,
                },
            )),
            ExprKind::Like { arg, pattern, escape, is_ilike, is_simple } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Like {
                    arg: Box::new(arg.rewrite_with_targetlist(tlist)?),
                    pattern: Box::new(pattern.deep_copy()),
                    escape: escape.as_ref().map(|e| Box::new(e.deep_copy())),
                    is_ilike: *is_ilike,
                    is_simple: *is_simple,
                },
            )),
            ExprKind::Case { branches, else_expr } => {
                let mut new_branches = Vec::with_capacity(branches.len());
                for (when, then) in branches {
                    new_branches.push((
                        when.rewrite_with_targetlist(tlist)?,
                        then.rewrite_with_targetlist(tlist)?,
                    ));
                }
                let new_else = match else_expr {
                    Some(e) => Some(Box::new(e.rewrite_with_targetlist(tlist)?)),
                    None => None,
                };
                Ok(Expr::new(
                    self.type_info,
                    self.contains_agg,
                    ExprKind::Case { branches: new_branches, else_expr: new_else },
                ))
            }
            ExprKind::Extract { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Extract {
                    field: *field,
                    from: Box::new(from.rewrite_with_targetlist(tlist)?),
                },
            )),
            ExprKind::DateTrunc { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::DateTrunc {
                    field: *field,
                    from: Box::new(from.rewrite_with_targetlist(tlist)?),
                },
            )),
            // Vars, constants, and subqueries copy through (subqueries fail
            // loudly inside deep_copy).
            _ => Ok(self.deep_copy()),
        }
    }

    /// Replace column references with `Var(InputOuter, varno)` slots pointing
    /// into a child targetlist, which must consist entirely of columns.
    /// Descends through aggregate arguments.
    pub fn rewrite_with_child_targetlist(&self, tlist: &[TargetEntry]) -> Result<Expr> {
        match &self.kind {
            ExprKind::Column(cv) => {
                let mut varno = 1;
                for tle in tlist {
                    let Some(colvar) = tle.expr.as_column_var() else {
                        return Err(Error::Internal(
                            "targetlist in child-targetlist rewrite is not all columns".into(),
                        ));
                    };
                    if cv.table_id == colvar.table_id && cv.column_id == colvar.column_id {
                        return Ok(Expr::var(
                            tle.expr.type_info,
                            colvar.table_id,
                            colvar.column_id,
                            colvar.rte_idx,
                            WhichRow::InputOuter,
                            varno,
                        ));
                    }
                    varno += 1;
                }
                Err(Error::Internal("cannot find ColumnVar in child targetlist".into()))
            }
            ExprKind::Agg { agg, arg, is_distinct } => {
                let new_arg = match arg {
                    Some(a) => Some(Box::new(a.rewrite_with_child_targetlist(tlist)?)),
                    None => None,
                };
                Ok(Expr::new(
                    self.type_info,
                    self.contains_agg,
                    ExprKind::Agg { agg: *agg, arg: new_arg, is_distinct: *is_distinct },
                ))
            }
            ExprKind::Unary { op, operand } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Unary {
                    op: *op,
                    operand: Box::new(operand.rewrite_with_child_targetlist(tlist)?),
                },
            )),
            ExprKind::Binary { op, qualifier, left, right } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Binary {
                    op: *op,
                    qualifier: *qualifier,
                    left: Box::new(left.rewrite_with_child_targetlist(tlist)?),
                    right: Box::new(right.rewrite_with_child_targetlist(tlist)?),
                },
            )),
            ExprKind::InValues { arg, values } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::InValues {
                    arg: Box::new(arg.rewrite_with_child_targetlist(tlist)?),
                    values: values.iter().map(Expr::deep_copy).collect(),
                },
            )),
            ExprKind::CharLength { arg, calc_encoded_length } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::CharLength {
                    arg: Box::new(arg.rewrite_with_child_targetlist(tlist)?),
                    calc_encoded_length: *calc_encoded_length,
                },
            )),
            ExprKind::Like { arg, pattern, escape, is_ilike, is_simple } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Like {
                    arg: Box::new(arg.rewrite_with_child_targetlist(tlist)?),
                    pattern: Box::new(pattern.deep_copy()),
                    escape: escape.as_ref().map(|e| Box::new(e.deep_copy())),
                    is_ilike: *is_ilike,
                    is_simple: *is_simple,
                },
            )),
            ExprKind::Case { branches, else_expr } => {
                let mut new_branches = Vec::with_capacity(branches.len());
                for (when, then) in branches {
                    new_branches.push((
                        when.rewrite_with_child_targetlist(tlist)?,
                        then.rewrite_with_child_targetlist(tlist)?,
                    ));
                }
                let new_else = match else_expr {
                    Some(e) => Some(Box::new(e.rewrite_with_child_targetlist(tlist)?)),
                    None => None,
                };
                Ok(Expr::new(
                    self.type_info,
                    self.contains_agg,
                    ExprKind::Case { branches: new_branches, else_expr: new_else },
                ))
            }
            ExprKind::Extract { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Extract {
                    field: *field,
                    from: Box::new(from.rewrite_with_child_targetlist(tlist)?),
                },
            )),
            ExprKind::DateTrunc { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::DateTrunc {
                    field: *field,
                    from: Box::new(from.rewrite_with_child_targetlist(tlist)?),
                },
            )),
            _ => Ok(self.deep_copy()),
        }
    }

    /// Lower a HAVING-style expression against the aggregate output:
    /// aggregates and grouped columns become `Var(InputOuter, varno)` slots
    /// into the targetlist, which may mix columns and aggregates.
    pub fn rewrite_agg_to_var(&self, tlist: &[TargetEntry]) -> Result<Expr> {
        match &self.kind {
            ExprKind::Column(cv) => {
                let mut varno = 1;
                for tle in tlist {
                    if !matches!(tle.expr.kind, ExprKind::Agg { .. }) {
                        let Some(colvar) = tle.expr.as_column_var() else {
                            return Err(Error::Internal(
                                "targetlist in aggregate rewrite is not all columns and aggregates"
                                    .into(),
                            ));
                        };
                        if cv.table_id == colvar.table_id && cv.column_id == colvar.column_id {
                            return Ok(Expr::var(
                                tle.expr.type_info,
                                colvar.table_id,
                                colvar.column_id,
                                colvar.rte_idx,
                                WhichRow::InputOuter,
                                varno,
                            ));
                        }
                    }
                    varno += 1;
                }
                Err(Error::Internal(
                    "cannot find ColumnVar from having clause in targetlist".into(),
                ))
            }
            ExprKind::Var { .. } => {
                let mut varno = 1;
                for tle in tlist {
                    if tle.expr == *self {
                        return Ok(Expr::slot_var(
                            tle.expr.type_info,
                            WhichRow::InputOuter,
                            varno,
                        ));
                    }
                    varno += 1;
                }
                Err(Error::Internal("cannot find Var from having clause in targetlist".into()))
            }
            ExprKind::Agg { .. } => {
                let mut varno = 1;
                for tle in tlist {
                    if matches!(tle.expr.kind, ExprKind::Agg { .. }) && *self == tle.expr {
                        return Ok(Expr::slot_var(
                            tle.expr.type_info,
                            WhichRow::InputOuter,
                            varno,
                        ));
                    }
                    varno += 1;
                }
                Err(Error::Internal(
                    "cannot find AggExpr from having clause in targetlist".into(),
                ))
            }
            ExprKind::Unary { op, operand } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Unary { op: *op, operand: Box::new(operand.rewrite_agg_to_var(tlist)?) },
            )),
            ExprKind::Binary { op, qualifier, left, right } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Binary {
                    op: *op,
                    qualifier: *qualifier,
                    left: Box::new(left.rewrite_agg_to_var(tlist)?),
                    right: Box::new(right.rewrite_agg_to_var(tlist)?),
                },
            )),
            ExprKind::InValues { arg, values } => {
                let new_values = values
                    .iter()
                    .map(|v| v.rewrite_agg_to_var(tlist))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::new(
                    self.type_info,
                    self.contains_agg,
                    ExprKind::InValues {
                        arg: Box::new(arg.rewrite_agg_to_var(tlist)?),
                        values: new_values,
                    },
                ))
            }
            ExprKind::CharLength { arg, calc_encoded_length } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::CharLength {
                    arg: Box::new(arg.rewrite_agg_to_var(tlist)?),
                    calc_encoded_length: *calc_encoded_length,
                },
            )),
            ExprKind::Like { arg, pattern, escape, is_ilike, is_simple } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Like {
                    arg: Box::new(arg.rewrite_agg_to_var(tlist)?),
                    pattern: Box::new(pattern.deep_copy()),
                    escape: escape.as_ref().map(|e| Box::new(e.deep_copy())),
                    is_ilike: *is_ilike,
                    is_simple: *is_simple,
                },
            )),
            ExprKind::Case { branches, else_expr } => {
                let mut new_branches = Vec::with_capacity(branches.len());
                for (when, then) in branches {
                    new_branches.push((
                        when.rewrite_agg_to_var(tlist)?,
                        then.rewrite_agg_to_var(tlist)?,
                    ));
                }
                let new_else = match else_expr {
                    Some(e) => Some(Box::new(e.rewrite_agg_to_var(tlist)?)),
                    None => None,
                };
                Ok(Expr::new(
                    self.type_info,
                    self.contains_agg,
                    ExprKind::Case { branches: new_branches, else_expr: new_else },
                ))
            }
            ExprKind::Extract { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::Extract { field: *field, from: Box::new(from.rewrite_agg_to_var(tlist)?) },
            )),
            ExprKind::DateTrunc { field, from } => Ok(Expr::new(
                self.type_info,
                self.contains_agg,
                ExprKind::DateTrunc {
                    field: *field,
                    from: Box::new(from.rewrite_agg_to_var(tlist)?),
                },
            )),
            _ => Ok(self.deep_copy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_type::{SqlType, TypeInfo};
    use crate::types::datum::Datum;
    use crate::types::expression::{AggKind, BinaryOp, Qualifier};

    fn int_ti() -> TypeInfo {
        TypeInfo::new(SqlType::Int)
    }

    fn col(table: i32, column: i32, rte: i32) -> Expr {
        Expr::column(int_ti(), table, column, rte)
    }

    fn sum_of(table: i32, column: i32) -> Expr {
        Expr::agg(
            TypeInfo::new(SqlType::BigInt),
            AggKind::Sum,
            Some(col(table, column, 0)),
            false,
        )
    }

    fn having_tlist() -> Vec<TargetEntry> {
        vec![
            TargetEntry::new("a", col(1, 1, 0), false),
            TargetEntry::new("total", sum_of(1, 2), false),
        ]
    }

    #[test]
    fn having_lowering_replaces_aggregate_with_slot() {
        // SUM(b) > 100 against [a, SUM(b)] -> Var(InputOuter, 2) > 100
        let having = Expr::binary(
            TypeInfo::new(SqlType::Bool),
            BinaryOp::Gt,
            Qualifier::One,
            sum_of(1, 2),
            Expr::constant(TypeInfo::new(SqlType::BigInt), Datum::BigInt(100)),
        );
        let rewritten = having.rewrite_agg_to_var(&having_tlist()).unwrap();
        let ExprKind::Binary { left, right, .. } = &rewritten.kind else {
            panic!("expected a comparison");
        };
        match &left.kind {
            ExprKind::Var { which_row, varno, .. } => {
                assert_eq!(*which_row, WhichRow::InputOuter);
                assert_eq!(*varno, 2);
            }
            other => panic!("expected a Var slot, found {:?}", other),
        }
        assert_eq!(left.type_info.kind, SqlType::BigInt);
        assert!(matches!(right.kind, ExprKind::Constant { .. }));
        assert_eq!(rewritten.type_info, TypeInfo::new(SqlType::Bool));
    }

    #[test]
    fn having_lowering_maps_grouped_columns() {
        let having = col(1, 1, 0);
        let rewritten = having.rewrite_agg_to_var(&having_tlist()).unwrap();
        match &rewritten.kind {
            ExprKind::Var { col: c, which_row, varno } => {
                assert_eq!((c.table_id, c.column_id, c.rte_idx), (1, 1, 0));
                assert_eq!(*which_row, WhichRow::InputOuter);
                assert_eq!(*varno, 1);
            }
            other => panic!("expected a Var slot, found {:?}", other),
        }
    }

    #[test]
    fn missing_aggregate_is_an_internal_error() {
        let other_agg = Expr::agg(
            TypeInfo::new(SqlType::BigInt),
            AggKind::Max,
            Some(col(1, 3, 0)),
            false,
        );
        assert!(matches!(
            other_agg.rewrite_agg_to_var(&having_tlist()),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn child_targetlist_rewrite_assigns_slot_numbers() {
        let tlist = vec![
            TargetEntry::new("a", col(1, 1, 0), false),
            TargetEntry::new("b", col(1, 2, 0), false),
        ];
        // SUM(b) descends into the aggregate argument.
        let agg = sum_of(1, 2);
        let rewritten = agg.rewrite_with_child_targetlist(&tlist).unwrap();
        let ExprKind::Agg { arg, .. } = &rewritten.kind else {
            panic!("expected an aggregate");
        };
        match &arg.as_ref().unwrap().kind {
            ExprKind::Var { varno, which_row, .. } => {
                assert_eq!(*varno, 2);
                assert_eq!(*which_row, WhichRow::InputOuter);
            }
            other => panic!("expected a Var slot, found {:?}", other),
        }
        assert!(rewritten.contains_agg);
    }

    #[test]
    fn child_targetlist_must_be_all_columns() {
        let tlist = vec![TargetEntry::new("total", sum_of(1, 2), false)];
        assert!(matches!(
            col(1, 2, 0).rewrite_with_child_targetlist(&tlist),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn targetlist_rewrite_preserves_type_info() {
        let tlist = vec![
            TargetEntry::new("a", col(1, 1, 0), false),
            TargetEntry::new("b", Expr::column(TypeInfo::new(SqlType::BigInt), 1, 2, 0), false),
        ];
        let pred = Expr::binary(
            TypeInfo::new(SqlType::Bool),
            BinaryOp::Lt,
            Qualifier::One,
            col(1, 1, 0),
            Expr::column(TypeInfo::new(SqlType::BigInt), 1, 2, 0),
        );
        let rewritten = pred.rewrite_with_targetlist(&tlist).unwrap();
        assert!(rewritten == pred);
        assert_eq!(rewritten.type_info, pred.type_info);
        let ExprKind::Binary { left, right, .. } = &rewritten.kind else {
            panic!("expected a comparison");
        };
        assert_eq!(left.type_info.kind, SqlType::Int);
        assert_eq!(right.type_info.kind, SqlType::BigInt);
    }

    #[test]
    fn targetlist_rewrite_requires_every_column() {
        let tlist = vec![TargetEntry::new("a", col(1, 1, 0), false)];
        assert!(matches!(
            col(9, 9, 0).rewrite_with_targetlist(&tlist),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn in_list_values_are_copied_not_rewritten() {
        let tlist = vec![TargetEntry::new("a", col(1, 1, 0), false)];
        let e = Expr::in_values(
            col(1, 1, 0),
            vec![Expr::constant(int_ti(), Datum::Int(1))],
        );
        let rewritten = e.rewrite_with_child_targetlist(&tlist).unwrap();
        let ExprKind::InValues { arg, values } = &rewritten.kind else {
            panic!("expected IN");
        };
        assert!(matches!(arg.kind, ExprKind::Var { .. }));
        assert!(matches!(values[0].kind, ExprKind::Constant { .. }));
    }
}
