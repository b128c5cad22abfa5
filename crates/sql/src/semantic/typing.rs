//! Result-type inference for binary operations
//!
//! `analyze_binary_type` enforces the SQL comparison/arithmetic rules and
//! reports the operand types to coerce to; `coerce_binary` is the driver that
//! applies those coercions and builds the node.

use crate::codec::DatumCodec;
use crate::error::{Error, Result};
use crate::types::data_type::{Compression, SqlType, TypeInfo};
use crate::types::expression::{BinaryOp, Expr, Qualifier};

/// Widen two numeric types to their common type.
///
/// Same-kind operands widen to the larger dimension and scale. Mixed kinds
/// follow the engine's numeric lattice; the scale always survives from the
/// NUMERIC side and the result is nullable until the caller refines it.
pub fn common_numeric_type(type1: &TypeInfo, type2: &TypeInfo) -> TypeInfo {
    assert!(
        type1.is_number() && type2.is_number(),
        "common_numeric_type on non-numeric operands"
    );
    if type1.kind == type2.kind {
        return TypeInfo::numeric(
            type1.kind,
            type1.dimension.max(type2.dimension),
            type1.scale.max(type2.scale),
            false,
        );
    }
    use SqlType::*;
    match (type1.kind, type2.kind) {
        (Double, _) | (_, Double) => TypeInfo::new(Double),
        (Float, _) | (_, Float) => TypeInfo::new(Float),
        (Numeric | Decimal, Numeric | Decimal) => {
            let scale = type1.scale.max(type2.scale);
            let integral =
                (type1.dimension - type1.scale).max(type2.dimension - type2.scale);
            TypeInfo::numeric(Numeric, integral + scale, scale, false)
        }
        (Numeric | Decimal, SmallInt) | (SmallInt, Numeric | Decimal) => {
            let dec = if type1.is_decimal() { type1 } else { type2 };
            TypeInfo::numeric(Numeric, (5 + dec.scale).max(dec.dimension), dec.scale, false)
        }
        (Numeric | Decimal, Int) | (Int, Numeric | Decimal) => {
            let dec = if type1.is_decimal() { type1 } else { type2 };
            TypeInfo::numeric(
                Numeric,
                19.min(10 + dec.scale).max(dec.dimension),
                dec.scale,
                false,
            )
        }
        (Numeric | Decimal, BigInt) | (BigInt, Numeric | Decimal) => {
            let dec = if type1.is_decimal() { type1 } else { type2 };
            TypeInfo::numeric(Numeric, 19, dec.scale, false)
        }
        (BigInt, _) | (_, BigInt) => TypeInfo::new(BigInt),
        (Int, _) | (_, Int) => TypeInfo::new(Int),
        _ => unreachable!("numeric kind pair not covered"),
    }
}

/// Combine two string types for an operation producing a string.
///
/// Matching dictionaries (directly or through a transient partner) survive;
/// any other mix decompresses, remembering the dictionary id so the planner
/// can re-encode.
pub fn common_string_type(type1: &TypeInfo, type2: &TypeInfo) -> TypeInfo {
    assert!(
        type1.is_string() && type2.is_string(),
        "common_string_type on non-string operands"
    );
    let mut comp = Compression::None;
    let mut comp_param = 0;
    if type1.compression == Compression::Dict && type2.compression == Compression::Dict {
        if type1.comp_param == type2.comp_param
            || type1.comp_param == crate::types::data_type::transient_dict(type2.comp_param)
        {
            comp = Compression::Dict;
            comp_param = type1.comp_param.min(type2.comp_param);
        }
    } else if type1.compression == Compression::Dict && type2.compression == Compression::None {
        comp_param = type1.comp_param;
    } else if type1.compression == Compression::None && type2.compression == Compression::Dict {
        comp_param = type2.comp_param;
    } else {
        // Preserve a previously recorded dictionary id if either side has one.
        comp_param = type1.comp_param.max(type2.comp_param);
    }
    if type1.kind == SqlType::Text || type2.kind == SqlType::Text {
        return TypeInfo::string(SqlType::Text, 0, false, comp, comp_param);
    }
    TypeInfo::string(
        SqlType::Varchar,
        type1.dimension.max(type2.dimension),
        false,
        comp,
        comp_param,
    )
}

/// Analyze a binary operation over operand types `left` and `right`.
///
/// Returns `(result, left', right')` where `left'`/`right'` are the types to
/// coerce each operand to (unchanged when no coercion is needed). The result
/// is non-null only when both operands are.
pub fn analyze_binary_type(
    op: BinaryOp,
    left: &TypeInfo,
    right: &TypeInfo,
) -> Result<(TypeInfo, TypeInfo, TypeInfo)> {
    let mut new_left = *left;
    let mut new_right = *right;
    let mut result;
    if op.is_logic() {
        if left.kind != SqlType::Bool || right.kind != SqlType::Bool {
            return Err(Error::NonBooleanLogic);
        }
        result = TypeInfo::new(SqlType::Bool);
    } else if op.is_comparison() {
        if left != right {
            if left.is_number() && right.is_number() {
                let common = common_numeric_type(left, right);
                new_left = common;
                new_left.not_null = left.not_null;
                new_right = common;
                new_right.not_null = right.not_null;
            } else if left.is_time() && right.is_time() {
                (new_left, new_right) = compare_time_types(left, right)?;
            } else if left.is_string() && right.is_time() {
                new_left = *right;
                new_left.not_null = left.not_null;
                new_right = *right;
            } else if left.is_time() && right.is_string() {
                new_left = *left;
                new_right = *left;
                new_right.not_null = right.not_null;
            } else if left.is_string() && right.is_string() {
                // Comparable as-is; encoding is reconciled by the executor.
            } else {
                return Err(Error::CannotCompare {
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        }
        result = TypeInfo::new(SqlType::Bool);
    } else {
        if !left.is_number() || !right.is_number() {
            return Err(Error::NonNumericArithmetic);
        }
        if op == BinaryOp::Modulo && (!left.is_integer() || !right.is_integer()) {
            return Err(Error::NonIntegerModulo);
        }
        let common = common_numeric_type(left, right);
        new_left = common;
        new_left.not_null = left.not_null;
        new_right = common;
        new_right.not_null = right.not_null;
        result = common;
    }
    result.not_null = left.not_null && right.not_null;
    Ok((result, new_left, new_right))
}

/// The legal temporal comparison pairs. TIME never mixes with DATE or
/// TIMESTAMP; DATE widens to TIMESTAMP; matching kinds settle on the larger
/// fractional-second dimension.
fn compare_time_types(left: &TypeInfo, right: &TypeInfo) -> Result<(TypeInfo, TypeInfo)> {
    use SqlType::*;
    match (left.kind, right.kind) {
        (Timestamp, Time) | (Time, Timestamp) | (Time, Date) | (Date, Time) => {
            Err(Error::CannotCompare { left: left.type_name(), right: right.type_name() })
        }
        (Timestamp, Date) | (Date, Date) => Ok((*left, *left)),
        (Date, Timestamp) => Ok((*right, *right)),
        (Timestamp, Timestamp) | (Time, Time) => {
            let dim = left.dimension.max(right.dimension);
            Ok((
                TypeInfo::numeric(left.kind, dim, 0, left.not_null),
                TypeInfo::numeric(left.kind, dim, 0, right.not_null),
            ))
        }
        _ => unreachable!("temporal kind pair not covered"),
    }
}

/// Build a type-checked binary node, inserting operand casts as required.
pub fn coerce_binary(
    op: BinaryOp,
    qualifier: Qualifier,
    left: Expr,
    right: Expr,
    codec: &dyn DatumCodec,
) -> Result<Expr> {
    let (result, left_ti, right_ti) = analyze_binary_type(op, &left.type_info, &right.type_info)?;
    let left = left.add_cast(&left_ti, codec)?;
    let right = right.add_cast(&right_ti, codec)?;
    Ok(Expr::binary(result, op, qualifier, left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TextCodec;
    use crate::types::datum::Datum;
    use crate::types::expression::{ExprKind, UnaryOp};

    fn num(kind: SqlType) -> TypeInfo {
        TypeInfo::new(kind)
    }

    fn decimal(p: i32, s: i32) -> TypeInfo {
        TypeInfo::numeric(SqlType::Numeric, p, s, false)
    }

    #[test]
    fn common_numeric_type_is_commutative() {
        let kinds = [
            num(SqlType::SmallInt),
            num(SqlType::Int),
            num(SqlType::BigInt),
            num(SqlType::Float),
            num(SqlType::Double),
            decimal(10, 2),
            decimal(15, 4),
        ];
        for a in &kinds {
            for b in &kinds {
                assert_eq!(
                    common_numeric_type(a, b),
                    common_numeric_type(b, a),
                    "{} vs {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn numeric_lattice() {
        assert_eq!(common_numeric_type(&num(SqlType::SmallInt), &num(SqlType::Int)).kind, SqlType::Int);
        assert_eq!(
            common_numeric_type(&num(SqlType::SmallInt), &num(SqlType::BigInt)).kind,
            SqlType::BigInt
        );
        assert_eq!(
            common_numeric_type(&num(SqlType::BigInt), &num(SqlType::Float)).kind,
            SqlType::Float
        );
        assert_eq!(
            common_numeric_type(&num(SqlType::Float), &num(SqlType::Double)).kind,
            SqlType::Double
        );
        assert_eq!(
            common_numeric_type(&decimal(10, 2), &num(SqlType::Float)).kind,
            SqlType::Float
        );
        assert_eq!(
            common_numeric_type(&decimal(10, 2), &num(SqlType::Double)).kind,
            SqlType::Double
        );

        // SMALLINT + NUMERIC(p,s) -> NUMERIC(max(5+s, p), s)
        assert_eq!(
            common_numeric_type(&num(SqlType::SmallInt), &decimal(10, 2)),
            decimal(10, 2)
        );
        assert_eq!(
            common_numeric_type(&num(SqlType::SmallInt), &decimal(4, 2)),
            decimal(7, 2)
        );
        // INT + NUMERIC(p,s) -> NUMERIC(max(min(19, 10+s), p), s)
        assert_eq!(common_numeric_type(&num(SqlType::Int), &decimal(10, 2)), decimal(12, 2));
        assert_eq!(common_numeric_type(&num(SqlType::Int), &decimal(15, 2)), decimal(15, 2));
        // BIGINT + NUMERIC -> NUMERIC(19, s)
        assert_eq!(common_numeric_type(&num(SqlType::BigInt), &decimal(10, 2)), decimal(19, 2));
        // NUMERIC(p1,s1) + NUMERIC(p2,s2)
        assert_eq!(common_numeric_type(&decimal(10, 2), &decimal(15, 4)), decimal(15, 4));
        assert_eq!(common_numeric_type(&decimal(12, 2), &decimal(8, 4)), decimal(14, 4));
    }

    #[test]
    fn same_kind_widen_keeps_dimension_and_scale() {
        let a = decimal(10, 2);
        let b = decimal(8, 5);
        assert_eq!(common_numeric_type(&a, &b), decimal(10, 5));
    }

    #[test]
    fn common_string_type_dictionary_rules() {
        let dict17 = TypeInfo::string(SqlType::Text, 0, false, Compression::Dict, 17);
        let dict42 = TypeInfo::string(SqlType::Text, 0, false, Compression::Dict, 42);
        let transient17 = TypeInfo::string(
            SqlType::Text,
            0,
            false,
            Compression::Dict,
            crate::types::data_type::transient_dict(17),
        );
        let plain = TypeInfo::string(SqlType::Varchar, 20, false, Compression::None, 0);

        let same = common_string_type(&dict17, &dict17);
        assert_eq!(same.compression, Compression::Dict);
        assert_eq!(same.comp_param, 17);

        let partner = common_string_type(&dict17, &transient17);
        assert_eq!(partner.compression, Compression::Dict);
        assert_eq!(partner.comp_param, transient17.comp_param);

        let unrelated = common_string_type(&dict17, &dict42);
        assert_eq!(unrelated.compression, Compression::None);
        assert_eq!(unrelated.comp_param, 0);

        let mixed = common_string_type(&dict17, &plain);
        assert_eq!(mixed.compression, Compression::None);
        assert_eq!(mixed.comp_param, 17);

        // TEXT on either side wins over VARCHAR.
        assert_eq!(common_string_type(&dict17, &plain).kind, SqlType::Text);
        let v1 = TypeInfo::string(SqlType::Varchar, 10, false, Compression::None, 0);
        let v2 = TypeInfo::string(SqlType::Varchar, 30, false, Compression::None, 0);
        let both = common_string_type(&v1, &v2);
        assert_eq!(both.kind, SqlType::Varchar);
        assert_eq!(both.dimension, 30);
    }

    #[test]
    fn logic_requires_booleans() {
        let err = analyze_binary_type(BinaryOp::And, &num(SqlType::Int), &num(SqlType::Bool))
            .unwrap_err();
        assert_eq!(err, Error::NonBooleanLogic);

        let (result, ..) = analyze_binary_type(
            BinaryOp::And,
            &TypeInfo::new(SqlType::Bool),
            &TypeInfo::new(SqlType::Bool),
        )
        .unwrap();
        assert_eq!(result.kind, SqlType::Bool);
    }

    #[test]
    fn modulo_requires_integers() {
        let err = analyze_binary_type(BinaryOp::Modulo, &num(SqlType::Int), &decimal(10, 2))
            .unwrap_err();
        assert_eq!(err, Error::NonIntegerModulo);
    }

    #[test]
    fn timestamp_comparison_widens_dimension() {
        let ts0 = TypeInfo::numeric(SqlType::Timestamp, 0, 0, false);
        let ts3 = TypeInfo::numeric(SqlType::Timestamp, 3, 0, false);
        let (result, new_left, new_right) =
            analyze_binary_type(BinaryOp::Eq, &ts0, &ts3).unwrap();
        assert_eq!(result.kind, SqlType::Bool);
        assert_eq!(new_left.kind, SqlType::Timestamp);
        assert_eq!(new_left.dimension, 3);
        assert_eq!(new_right.dimension, 3);
    }

    #[test]
    fn timestamp_time_comparison_is_an_error() {
        let ts = TypeInfo::new(SqlType::Timestamp);
        let time = TypeInfo::new(SqlType::Time);
        let err = analyze_binary_type(BinaryOp::Eq, &ts, &time).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot compare between TIMESTAMP and TIME"
        );
        assert!(analyze_binary_type(BinaryOp::Eq, &time, &ts).is_err());
        assert!(analyze_binary_type(
            BinaryOp::Eq,
            &time,
            &TypeInfo::new(SqlType::Date)
        )
        .is_err());
    }

    #[test]
    fn date_widens_to_timestamp() {
        let ts = TypeInfo::new(SqlType::Timestamp);
        let date = TypeInfo::new(SqlType::Date);
        let (_, new_left, new_right) = analyze_binary_type(BinaryOp::Lt, &date, &ts).unwrap();
        assert_eq!(new_left.kind, SqlType::Timestamp);
        assert_eq!(new_right.kind, SqlType::Timestamp);
    }

    #[test]
    fn string_coerces_to_the_time_side() {
        let ts = TypeInfo::with_notnull(SqlType::Timestamp, true);
        let s = TypeInfo::new(SqlType::Text);
        let (_, new_left, new_right) = analyze_binary_type(BinaryOp::Eq, &s, &ts).unwrap();
        assert_eq!(new_left.kind, SqlType::Timestamp);
        assert!(!new_left.not_null);
        assert_eq!(new_right, ts);
    }

    #[test]
    fn incomparable_kinds_error() {
        let err =
            analyze_binary_type(BinaryOp::Eq, &TypeInfo::new(SqlType::Bool), &num(SqlType::Int))
                .unwrap_err();
        assert_eq!(err.to_string(), "Cannot compare between BOOLEAN and INT");
    }

    #[test]
    fn smallint_plus_numeric_inserts_scaling_casts() {
        // SMALLINT(not null) + NUMERIC(10,2) -> NUMERIC(10,2), not-null
        // tracking per operand, literal mantissa scaled by 100.
        let codec = TextCodec;
        let left = Expr::constant(
            TypeInfo::with_notnull(SqlType::SmallInt, true),
            Datum::SmallInt(7),
        );
        let right = Expr::column(TypeInfo::numeric(SqlType::Numeric, 10, 2, true), 1, 1, 0);
        let sum = coerce_binary(BinaryOp::Plus, Qualifier::One, left, right, &codec).unwrap();

        assert_eq!(sum.type_info, TypeInfo::numeric(SqlType::Numeric, 10, 2, true));
        let ExprKind::Binary { left, right, .. } = &sum.kind else {
            panic!("expected a binary node");
        };
        // The literal folds: no CAST wrapper, mantissa times 10^2.
        assert_eq!(left.type_info, TypeInfo::numeric(SqlType::Numeric, 10, 2, true));
        match &left.kind {
            ExprKind::Constant { value, .. } => assert_eq!(value.as_bigint(), 700),
            other => panic!("expected folded constant, found {:?}", other),
        }
        // The column already has the common type, so it stays bare.
        assert_eq!(right.type_info, TypeInfo::numeric(SqlType::Numeric, 10, 2, true));
        assert!(matches!(right.kind, ExprKind::Column(_)));
    }

    #[test]
    fn narrower_decimal_operand_gets_a_cast_wrapper() {
        let codec = TextCodec;
        let left = Expr::column(TypeInfo::numeric(SqlType::Numeric, 4, 2, false), 1, 1, 0);
        let right = Expr::column(TypeInfo::with_notnull(SqlType::SmallInt, false), 1, 2, 0);
        let sum = coerce_binary(BinaryOp::Plus, Qualifier::One, left, right, &codec).unwrap();
        assert_eq!(sum.type_info, TypeInfo::numeric(SqlType::Numeric, 7, 2, false));
        let ExprKind::Binary { left, right, .. } = &sum.kind else {
            panic!("expected a binary node");
        };
        assert!(matches!(left.kind, ExprKind::Unary { op: UnaryOp::Cast, .. }));
        assert!(matches!(right.kind, ExprKind::Unary { op: UnaryOp::Cast, .. }));
    }

    #[test]
    fn nullability_of_comparison_result() {
        let l = TypeInfo::with_notnull(SqlType::Int, true);
        let r = TypeInfo::with_notnull(SqlType::BigInt, false);
        let (result, new_left, new_right) = analyze_binary_type(BinaryOp::Eq, &l, &r).unwrap();
        assert!(!result.not_null);
        assert!(new_left.not_null);
        assert!(!new_right.not_null);
    }
}
