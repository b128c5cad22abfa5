//! Predicate classification for the planner
//!
//! A WHERE tree splits into scan predicates (one referenced table), join
//! predicates (several tables), and constant predicates (none). Only
//! conjunctions split; any other node classifies as a single unit.

use crate::types::expression::{BinaryOp, Expr, ExprKind, Qualifier};
use std::collections::BTreeSet;

/// The three predicate buckets, borrowing from the classified tree.
#[derive(Debug, Default)]
pub struct PredicateBuckets<'a> {
    pub scan: Vec<&'a Expr>,
    pub join: Vec<&'a Expr>,
    pub constant: Vec<&'a Expr>,
}

impl<'a> PredicateBuckets<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a whole predicate tree and log the bucket sizes.
    pub fn classify(expr: &'a Expr) -> Self {
        let mut buckets = Self::new();
        expr.group_predicates(&mut buckets);
        tracing::debug!(
            scan = buckets.scan.len(),
            join = buckets.join.len(),
            constant = buckets.constant.len(),
            "classified predicates"
        );
        buckets
    }
}

impl Expr {
    /// Distribute the AND-leaves of this tree into `buckets`.
    pub fn group_predicates<'a>(&'a self, buckets: &mut PredicateBuckets<'a>) {
        match &self.kind {
            ExprKind::Column(_) => {
                if self.is_boolean_column() {
                    buckets.scan.push(self);
                }
            }
            ExprKind::Binary { op: BinaryOp::And, left, right, .. } => {
                left.group_predicates(buckets);
                right.group_predicates(buckets);
            }
            ExprKind::Unary { operand, .. } => {
                let mut rte_set = BTreeSet::new();
                operand.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Binary { left, right, .. } => {
                let mut rte_set = BTreeSet::new();
                left.collect_rte_idx(&mut rte_set);
                right.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::InValues { arg, .. } => {
                let mut rte_set = BTreeSet::new();
                arg.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::CharLength { arg, .. } => {
                let mut rte_set = BTreeSet::new();
                arg.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Like { arg, .. } => {
                let mut rte_set = BTreeSet::new();
                arg.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Agg { arg, .. } => {
                let mut rte_set = BTreeSet::new();
                if let Some(a) = arg {
                    a.collect_rte_idx(&mut rte_set);
                }
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Case { branches, else_expr } => {
                let mut rte_set = BTreeSet::new();
                for (when, then) in branches {
                    when.collect_rte_idx(&mut rte_set);
                    then.collect_rte_idx(&mut rte_set);
                }
                if let Some(e) = else_expr {
                    e.collect_rte_idx(&mut rte_set);
                }
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Extract { from, .. } | ExprKind::DateTrunc { from, .. } => {
                let mut rte_set = BTreeSet::new();
                from.collect_rte_idx(&mut rte_set);
                buckets.push_by_span(self, rte_set.len());
            }
            ExprKind::Var { .. } | ExprKind::Constant { .. } | ExprKind::Subquery { .. } => {}
        }
    }

    /// Canonicalize a simple comparison to `column OP constant`, commuting
    /// the operator when the literal is on the left. Returns the canonical
    /// tree and the column's `rte_idx`, or `None` for anything that is not a
    /// plain single-column comparison.
    pub fn normalize_simple_predicate(&self) -> Option<(Expr, i32)> {
        let ExprKind::Binary { op, qualifier, left, right } = &self.kind else {
            return None;
        };
        if !op.is_comparison() || *qualifier != Qualifier::One {
            return None;
        }
        match (&left.kind, &right.kind) {
            (ExprKind::Column(cv), ExprKind::Constant { .. }) => {
                Some((self.deep_copy(), cv.rte_idx))
            }
            (ExprKind::Constant { .. }, ExprKind::Column(cv)) => {
                let commuted = Expr::binary(
                    self.type_info,
                    op.commute_comparison(),
                    *qualifier,
                    right.deep_copy(),
                    left.deep_copy(),
                );
                Some((commuted, cv.rte_idx))
            }
            _ => None,
        }
    }
}

impl<'a> PredicateBuckets<'a> {
    fn push_by_span(&mut self, expr: &'a Expr, span: usize) {
        if span > 1 {
            self.join.push(expr);
        } else if span == 1 {
            self.scan.push(expr);
        } else {
            self.constant.push(expr);
        }
    }
}
