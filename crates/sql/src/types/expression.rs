//! The analyzed expression tree
//!
//! Every node carries its analyzed [`TypeInfo`] and a `contains_agg` flag; the
//! variants form a closed sum so each recursive pass dispatches with
//! compile-time exhaustiveness. Nodes are uniquely owned by their parent and
//! copies are always explicit via [`Expr::deep_copy`].

use crate::types::data_type::{SqlType, TypeInfo};
use crate::types::datum::{datum_equal, format_datum, null_datum, Datum};
use crate::types::query::Query;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which plan row a [`Var`](ExprKind::Var) slot reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhichRow {
    InputOuter,
    InputInner,
    Output,
    GroupBy,
}

/// Comparison qualifier: plain, `ANY`, or `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qualifier {
    One,
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    UMinus,
    IsNull,
    Exists,
    Cast,
    Unnest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    /// The comparison obtained by swapping the operands: `<` ↔ `>`,
    /// `<=` ↔ `>=`; equality and inequality are their own commutations.
    pub fn commute_comparison(&self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => *other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggKind {
    Avg,
    Min,
    Max,
    Sum,
    Count,
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggKind::Avg => "AVG",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::Sum => "SUM",
            AggKind::Count => "COUNT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateTimeField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    DayOfWeek,
    DayOfYear,
    Epoch,
}

impl fmt::Display for DateTimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateTimeField::Year => "YEAR",
            DateTimeField::Month => "MONTH",
            DateTimeField::Day => "DAY",
            DateTimeField::Hour => "HOUR",
            DateTimeField::Minute => "MINUTE",
            DateTimeField::Second => "SECOND",
            DateTimeField::DayOfWeek => "DOW",
            DateTimeField::DayOfYear => "DOY",
            DateTimeField::Epoch => "EPOCH",
        };
        write!(f, "{}", s)
    }
}

/// Reference to a physical column. `rte_idx` is the 0-based position of the
/// owning range table entry; −1 until the reference is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnVar {
    pub table_id: i32,
    pub column_id: i32,
    pub rte_idx: i32,
}

/// The closed set of node shapes.
#[derive(Debug, Serialize, Deserialize)]
pub enum ExprKind {
    /// Reference to a physical column.
    Column(ColumnVar),
    /// Post-rewrite reference to a slot in a child plan's output. The column
    /// coordinates are kept when the slot still maps to a physical column;
    /// slot-only vars leave them at their unbound defaults.
    Var {
        col: ColumnVar,
        which_row: WhichRow,
        /// 1-based slot number in the child output.
        varno: usize,
    },
    /// Literal value. `is_null` is authoritative; the datum then holds the
    /// type's null sentinel.
    Constant { is_null: bool, value: Datum },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        qualifier: Qualifier,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    InValues {
        arg: Box<Expr>,
        values: Vec<Expr>,
    },
    CharLength {
        arg: Box<Expr>,
        /// Encoded (byte) length vs. logical character count.
        calc_encoded_length: bool,
    },
    Like {
        arg: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        is_ilike: bool,
        /// Pattern reducible to prefix/suffix/containment checks.
        is_simple: bool,
    },
    Agg {
        agg: AggKind,
        /// `None` only for `COUNT(*)`.
        arg: Option<Box<Expr>>,
        is_distinct: bool,
    },
    Case {
        branches: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },
    Extract {
        field: DateTimeField,
        from: Box<Expr>,
    },
    DateTrunc {
        field: DateTimeField,
        from: Box<Expr>,
    },
    /// Owned parsed subquery. Deep copy and structural equality are
    /// unsupported and fail loudly.
    Subquery { parse_tree: Box<Query> },
}

/// An analyzed expression node.
#[derive(Debug, Serialize, Deserialize)]
pub struct Expr {
    pub type_info: TypeInfo,
    pub contains_agg: bool,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(type_info: TypeInfo, contains_agg: bool, kind: ExprKind) -> Self {
        Self { type_info, contains_agg, kind }
    }

    pub fn column(type_info: TypeInfo, table_id: i32, column_id: i32, rte_idx: i32) -> Self {
        Self::new(type_info, false, ExprKind::Column(ColumnVar { table_id, column_id, rte_idx }))
    }

    pub fn var(
        type_info: TypeInfo,
        table_id: i32,
        column_id: i32,
        rte_idx: i32,
        which_row: WhichRow,
        varno: usize,
    ) -> Self {
        Self::new(
            type_info,
            false,
            ExprKind::Var { col: ColumnVar { table_id, column_id, rte_idx }, which_row, varno },
        )
    }

    /// A `Var` that only names an output slot, with no physical column behind it.
    pub fn slot_var(type_info: TypeInfo, which_row: WhichRow, varno: usize) -> Self {
        Self::var(type_info, 0, 0, -1, which_row, varno)
    }

    pub fn constant(type_info: TypeInfo, value: Datum) -> Self {
        Self::new(type_info, false, ExprKind::Constant { is_null: false, value })
    }

    pub fn null_constant(kind: SqlType) -> Self {
        let type_info = TypeInfo::new(kind);
        let value = null_datum(&type_info);
        Self::new(type_info, false, ExprKind::Constant { is_null: true, value })
    }

    pub fn unary(type_info: TypeInfo, op: UnaryOp, operand: Expr) -> Self {
        let contains_agg = operand.contains_agg;
        Self::new(type_info, contains_agg, ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn binary(
        type_info: TypeInfo,
        op: BinaryOp,
        qualifier: Qualifier,
        left: Expr,
        right: Expr,
    ) -> Self {
        let contains_agg = left.contains_agg || right.contains_agg;
        Self::new(
            type_info,
            contains_agg,
            ExprKind::Binary { op, qualifier, left: Box::new(left), right: Box::new(right) },
        )
    }

    pub fn in_values(arg: Expr, values: Vec<Expr>) -> Self {
        let type_info = TypeInfo::with_notnull(SqlType::Bool, arg.type_info.not_null);
        let contains_agg = arg.contains_agg || values.iter().any(|v| v.contains_agg);
        Self::new(type_info, contains_agg, ExprKind::InValues { arg: Box::new(arg), values })
    }

    pub fn char_length(arg: Expr, calc_encoded_length: bool) -> Self {
        let type_info = TypeInfo::with_notnull(SqlType::Int, arg.type_info.not_null);
        let contains_agg = arg.contains_agg;
        Self::new(
            type_info,
            contains_agg,
            ExprKind::CharLength { arg: Box::new(arg), calc_encoded_length },
        )
    }

    pub fn like(
        arg: Expr,
        pattern: Expr,
        escape: Option<Expr>,
        is_ilike: bool,
        is_simple: bool,
    ) -> Self {
        let type_info = TypeInfo::with_notnull(SqlType::Bool, arg.type_info.not_null);
        let contains_agg = arg.contains_agg
            || pattern.contains_agg
            || escape.as_ref().is_some_and(|e| e.contains_agg);
        Self::new(
            type_info,
            contains_agg,
            ExprKind::Like {
                arg: Box::new(arg),
                pattern: Box::new(pattern),
                escape: escape.map(Box::new),
                is_ilike,
                is_simple,
            },
        )
    }

    pub fn agg(type_info: TypeInfo, agg: AggKind, arg: Option<Expr>, is_distinct: bool) -> Self {
        Self::new(type_info, true, ExprKind::Agg { agg, arg: arg.map(Box::new), is_distinct })
    }

    pub fn case(type_info: TypeInfo, branches: Vec<(Expr, Expr)>, else_expr: Option<Expr>) -> Self {
        let contains_agg = branches
            .iter()
            .any(|(when, then)| when.contains_agg || then.contains_agg)
            || else_expr.as_ref().is_some_and(|e| e.contains_agg);
        Self::new(
            type_info,
            contains_agg,
            ExprKind::Case { branches, else_expr: else_expr.map(Box::new) },
        )
    }

    /// `EXTRACT(field FROM from)`; always BIGINT.
    pub fn extract(field: DateTimeField, from: Expr) -> Self {
        let type_info = TypeInfo::with_notnull(SqlType::BigInt, from.type_info.not_null);
        let contains_agg = from.contains_agg;
        Self::new(type_info, contains_agg, ExprKind::Extract { field, from: Box::new(from) })
    }

    /// `DATE_TRUNC(field, from)`; keeps the source temporal type.
    pub fn date_trunc(field: DateTimeField, from: Expr) -> Self {
        let type_info = from.type_info;
        let contains_agg = from.contains_agg;
        Self::new(type_info, contains_agg, ExprKind::DateTrunc { field, from: Box::new(from) })
    }

    pub fn subquery(type_info: TypeInfo, parse_tree: Query) -> Self {
        Self::new(type_info, false, ExprKind::Subquery { parse_tree: Box::new(parse_tree) })
    }

    /// Structural clone; all children and owned strings are duplicated.
    ///
    /// # Panics
    ///
    /// Panics on subqueries, which cannot be cloned.
    pub fn deep_copy(&self) -> Expr {
        let kind = match &self.kind {
            ExprKind::Column(cv) => ExprKind::Column(*cv),
            ExprKind::Var { col, which_row, varno } => {
                ExprKind::Var { col: *col, which_row: *which_row, varno: *varno }
            }
            ExprKind::Constant { is_null, value } => {
                ExprKind::Constant { is_null: *is_null, value: value.clone() }
            }
            ExprKind::Unary { op, operand } => {
                ExprKind::Unary { op: *op, operand: Box::new(operand.deep_copy()) }
            }
            ExprKind::Binary { op, qualifier, left, right } => ExprKind::Binary {
                op: *op,
                qualifier: *qualifier,
                left: Box::new(left.deep_copy()),
                right: Box::new(right.deep_copy()),
            },
            ExprKind::InValues { arg, values } => ExprKind::InValues {
                arg: Box::new(arg.deep_copy()),
                values: values.iter().map(Expr::deep_copy).collect(),
            },
            ExprKind::CharLength { arg, calc_encoded_length } => ExprKind::CharLength {
                arg: Box::new(arg.deep_copy()),
                calc_encoded_length: *calc_encoded_length,
            },
            ExprKind::Like { arg, pattern, escape, is_ilike, is_simple } => ExprKind::Like {
                arg: Box::new(arg.deep_copy()),
                pattern: Box::new(pattern.deep_copy()),
                escape: escape.as_ref().map(|e| Box::new(e.deep_copy())),
                is_ilike: *is_ilike,
                is_simple: *is_simple,
            },
            ExprKind::Agg { agg, arg, is_distinct } => ExprKind::Agg {
                agg: *agg,
                arg: arg.as_ref().map(|a| Box::new(a.deep_copy())),
                is_distinct: *is_distinct,
            },
            ExprKind::Case { branches, else_expr } => ExprKind::Case {
                branches: branches
                    .iter()
                    .map(|(when, then)| (when.deep_copy(), then.deep_copy()))
                    .collect(),
                else_expr: else_expr.as_ref().map(|e| Box::new(e.deep_copy())),
            },
            ExprKind::Extract { field, from } => {
                ExprKind::Extract { field: *field, from: Box::new(from.deep_copy()) }
            }
            ExprKind::DateTrunc { field, from } => {
                ExprKind::DateTrunc { field: *field, from: Box::new(from.deep_copy()) }
            }
            ExprKind::Subquery { .. } => panic!("deep copy of a subquery is not supported"),
        };
        Expr::new(self.type_info, self.contains_agg, kind)
    }

    /// The column coordinates of a `Column` or `Var` node, if this is one.
    pub fn as_column_var(&self) -> Option<&ColumnVar> {
        match &self.kind {
            ExprKind::Column(cv) => Some(cv),
            ExprKind::Var { col, .. } => Some(col),
            _ => None,
        }
    }
}

fn column_var_eq(
    lhs: &ColumnVar,
    lhs_var: Option<(WhichRow, usize)>,
    rhs: &ColumnVar,
    rhs_var: Option<(WhichRow, usize)>,
) -> bool {
    // Bound references compare by physical coordinates; unbound ones only
    // compare as Var slots.
    if lhs.rte_idx != -1 {
        return lhs.table_id == rhs.table_id
            && lhs.column_id == rhs.column_id
            && lhs.rte_idx == rhs.rte_idx;
    }
    match (lhs_var, rhs_var) {
        (Some((lw, ln)), Some((rw, rn))) => lw == rw && ln == rn,
        _ => false,
    }
}

impl PartialEq for Expr {
    /// Structural equality: variant tag plus fields plus recursive children.
    /// `type_info` only participates for constants, matching what the
    /// downstream rewriters rely on.
    ///
    /// # Panics
    ///
    /// Panics when either side is a subquery.
    fn eq(&self, other: &Expr) -> bool {
        use ExprKind::*;
        match (&self.kind, &other.kind) {
            (Subquery { .. }, _) | (_, Subquery { .. }) => {
                panic!("structural equality of subqueries is not supported")
            }
            (Column(l), Column(r)) => column_var_eq(l, None, r, None),
            (Column(l), Var { col: r, which_row, varno }) => {
                column_var_eq(l, None, r, Some((*which_row, *varno)))
            }
            (Var { col: l, which_row, varno }, Column(r)) => {
                column_var_eq(l, Some((*which_row, *varno)), r, None)
            }
            (
                Var { col: l, which_row: lw, varno: ln },
                Var { col: r, which_row: rw, varno: rn },
            ) => column_var_eq(l, Some((*lw, *ln)), r, Some((*rw, *rn))),
            (Constant { is_null: ln, value: lv }, Constant { is_null: rn, value: rv }) => {
                self.type_info == other.type_info && ln == rn && datum_equal(&self.type_info, lv, rv)
            }
            (Unary { op: lo, operand: l }, Unary { op: ro, operand: r }) => lo == ro && l == r,
            (
                Binary { op: lo, left: ll, right: lr, .. },
                Binary { op: ro, left: rl, right: rr, .. },
            ) => lo == ro && ll == rl && lr == rr,
            (InValues { arg: la, values: lv }, InValues { arg: ra, values: rv }) => {
                la == ra && lv.len() == rv.len() && lv.iter().zip(rv).all(|(a, b)| a == b)
            }
            (
                CharLength { arg: la, calc_encoded_length: le },
                CharLength { arg: ra, calc_encoded_length: re },
            ) => la == ra && le == re,
            (
                Like { arg: la, pattern: lp, escape: le, is_ilike: li, .. },
                Like { arg: ra, pattern: rp, escape: re, is_ilike: ri, .. },
            ) => {
                la == ra
                    && lp == rp
                    && li == ri
                    && match (le, re) {
                        (None, None) => true,
                        (Some(l), Some(r)) => l == r,
                        _ => false,
                    }
            }
            (
                Agg { agg: lk, arg: la, is_distinct: ld },
                Agg { agg: rk, arg: ra, is_distinct: rd },
            ) => {
                lk == rk
                    && ld == rd
                    && match (la, ra) {
                        (None, None) => true,
                        (Some(l), Some(r)) => l == r,
                        _ => false,
                    }
            }
            (
                Case { branches: lb, else_expr: le },
                Case { branches: rb, else_expr: re },
            ) => {
                lb.len() == rb.len()
                    && lb
                        .iter()
                        .zip(rb)
                        .all(|((lw, lt), (rw, rt))| lw == rw && lt == rt)
                    && match (le, re) {
                        (None, None) => true,
                        (Some(l), Some(r)) => l == r,
                        _ => false,
                    }
            }
            (Extract { field: lf, from: l }, Extract { field: rf, from: r }) => {
                lf == rf && l == r
            }
            (DateTrunc { field: lf, from: l }, DateTrunc { field: rf, from: r }) => {
                lf == rf && l == r
            }
            _ => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Column(cv) => write!(
                f,
                "(ColumnVar table: {} column: {} rte: {})",
                cv.table_id, cv.column_id, cv.rte_idx
            ),
            ExprKind::Var { col, which_row, varno } => write!(
                f,
                "(Var table: {} column: {} rte: {} which_row: {:?} varno: {})",
                col.table_id, col.column_id, col.rte_idx, which_row, varno
            ),
            ExprKind::Constant { is_null, value } => {
                if *is_null {
                    write!(f, "(Const NULL)")
                } else {
                    write!(f, "(Const {})", format_datum(value, &self.type_info))
                }
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "(NOT {})", operand),
                UnaryOp::UMinus => write!(f, "(- {})", operand),
                UnaryOp::IsNull => write!(f, "(IS NULL {})", operand),
                UnaryOp::Exists => write!(f, "(EXISTS {})", operand),
                UnaryOp::Cast => write!(f, "(CAST {} {})", self.type_info, operand),
                UnaryOp::Unnest => write!(f, "(UNNEST {})", operand),
            },
            ExprKind::Binary { op, qualifier, left, right } => {
                write!(f, "({} ", op)?;
                match qualifier {
                    Qualifier::One => {}
                    Qualifier::Any => write!(f, "ANY ")?,
                    Qualifier::All => write!(f, "ALL ")?,
                }
                write!(f, "{} {})", left, right)
            }
            ExprKind::InValues { arg, values } => {
                write!(f, "(IN {} (", arg)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "))")
            }
            ExprKind::CharLength { arg, calc_encoded_length } => {
                if *calc_encoded_length {
                    write!(f, "CHAR_LENGTH({})", arg)
                } else {
                    write!(f, "LENGTH({})", arg)
                }
            }
            ExprKind::Like { arg, pattern, escape, is_ilike, .. } => {
                write!(f, "({} {} {}", if *is_ilike { "ILIKE" } else { "LIKE" }, arg, pattern)?;
                if let Some(e) = escape {
                    write!(f, " ESCAPE {}", e)?;
                }
                write!(f, ")")
            }
            ExprKind::Agg { agg, arg, is_distinct } => {
                write!(f, "({} ", agg)?;
                if *is_distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(a) => write!(f, "{})", a),
                    None => write!(f, "*)"),
                }
            }
            ExprKind::Case { branches, else_expr } => {
                write!(f, "CASE")?;
                for (when, then) in branches {
                    write!(f, " ({}, {})", when, then)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            ExprKind::Extract { field, from } => write!(f, "EXTRACT({} FROM {})", field, from),
            ExprKind::DateTrunc { field, from } => write!(f, "DATE_TRUNC({}, {})", field, from),
            ExprKind::Subquery { .. } => write!(f, "(Subquery)"),
        }
    }
}
