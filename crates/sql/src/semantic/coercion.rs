//! Cast insertion and constant cast folding
//!
//! `add_cast` consumes the receiver and returns the coerced tree: most nodes
//! get wrapped in a `CAST`, constants fold the conversion into their datum,
//! `CAST` nodes elide dictionary decode/encode round-trips, and CASE pushes
//! the cast into its result branches.

use crate::codec::DatumCodec;
use crate::error::{Error, Result};
use crate::types::data_type::{transient_dict, Compression, SqlType, TypeInfo, TRANSIENT_DICT_ID};
use crate::types::datum::{null_datum, Datum};
use crate::types::expression::{Expr, ExprKind, UnaryOp};

impl Expr {
    /// Coerce this expression to `new_ti`, returning the (possibly identical)
    /// tree. See the variant-specific behavior on the helper methods below.
    pub fn add_cast(self, new_ti: &TypeInfo, codec: &dyn DatumCodec) -> Result<Expr> {
        match &self.kind {
            ExprKind::Constant { .. } => self.constant_add_cast(new_ti, codec),
            ExprKind::Unary { op: UnaryOp::Cast, .. } => self.cast_add_cast(new_ti),
            ExprKind::Case { .. } => self.case_add_cast(new_ti, codec),
            ExprKind::Subquery { .. } => Err(Error::UnsupportedSubquery("CAST")),
            _ => self.wrap_cast(new_ti),
        }
    }

    /// Insert a decompressing cast; a no-op on uncompressed expressions.
    pub fn decompress(self) -> Expr {
        if self.type_info.compression == Compression::None {
            return self;
        }
        let mut new_ti = self.type_info;
        new_ti.compression = Compression::None;
        new_ti.comp_param = 0;
        let contains_agg = self.contains_agg;
        Expr::new(new_ti, contains_agg, ExprKind::Unary { op: UnaryOp::Cast, operand: Box::new(self) })
    }

    /// The generic path: self-return on a no-op cast, a `CAST` wrapper
    /// otherwise. Only constants may be encoded into a transient or
    /// planner-synthesized dictionary; everything else reports the
    /// appropriate user or executor-limitation error.
    fn wrap_cast(self, new_ti: &TypeInfo) -> Result<Expr> {
        if *new_ti == self.type_info {
            return Ok(self);
        }
        if new_ti.is_string()
            && self.type_info.is_string()
            && new_ti.compression == Compression::Dict
            && self.type_info.compression == Compression::Dict
            && (new_ti.comp_param == self.type_info.comp_param
                || new_ti.comp_param == transient_dict(self.type_info.comp_param))
        {
            return Ok(self);
        }
        if !self.type_info.is_castable(new_ti) {
            return Err(Error::UncastableTypes {
                from: self.type_info.type_name(),
                to: new_ti.type_name(),
            });
        }
        if !matches!(self.kind, ExprKind::Constant { .. })
            && new_ti.is_string()
            && new_ti.compression == Compression::Dict
            && new_ti.comp_param <= TRANSIENT_DICT_ID
        {
            if self.type_info.is_string() && self.type_info.compression != Compression::Dict {
                return Err(Error::GroupingOnNonDictString);
            }
            return Err(Error::TransientDictOnNonLiteral);
        }
        let contains_agg = self.contains_agg;
        Ok(Expr::new(
            *new_ti,
            contains_agg,
            ExprKind::Unary { op: UnaryOp::Cast, operand: Box::new(self) },
        ))
    }

    /// Constants fold casts eagerly: NULLs are retyped onto the new type's
    /// sentinel, encoding changes decode first and re-encode through a
    /// `CAST` wrapper, and everything else rewrites the datum in place.
    fn constant_add_cast(mut self, new_ti: &TypeInfo, codec: &dyn DatumCodec) -> Result<Expr> {
        let ExprKind::Constant { is_null, value } = &mut self.kind else {
            unreachable!("constant_add_cast on a non-constant");
        };
        if *is_null {
            self.type_info = *new_ti;
            *value = null_datum(new_ti);
            return Ok(self);
        }
        if new_ti.compression != self.type_info.compression {
            if new_ti.compression != Compression::None {
                let mut decoded = *new_ti;
                decoded.compression = Compression::None;
                do_cast(value, &mut self.type_info, &decoded, codec)?;
            }
            return self.wrap_cast(new_ti);
        }
        do_cast(value, &mut self.type_info, new_ti, codec)?;
        Ok(self)
    }

    /// A `CAST` that decodes a dictionary string and is then asked to encode
    /// back into the same dictionary (or its transient partner) unwraps to
    /// the original operand, eliding the round-trip.
    fn cast_add_cast(self, new_ti: &TypeInfo) -> Result<Expr> {
        let elides = self.type_info.is_string()
            && new_ti.is_string()
            && new_ti.compression == Compression::Dict
            && self.type_info.compression == Compression::None
            && match &self.kind {
                ExprKind::Unary { op: UnaryOp::Cast, operand } => {
                    let oti = &operand.type_info;
                    oti.is_string()
                        && oti.compression == Compression::Dict
                        && (oti.comp_param == new_ti.comp_param
                            || oti.comp_param == transient_dict(new_ti.comp_param))
                }
                _ => false,
            };
        if elides {
            tracing::trace!(dict = new_ti.comp_param, "elided dictionary cast round-trip");
            let ExprKind::Unary { operand, .. } = self.kind else { unreachable!() };
            return Ok(*operand);
        }
        self.wrap_cast(new_ti)
    }

    /// CASE distributes the cast over its THEN branches and ELSE. A request
    /// for a planner-synthesized dictionary on a decompressed CASE keeps the
    /// original dictionary's identity through the transient id.
    fn case_add_cast(mut self, new_ti: &TypeInfo, codec: &dyn DatumCodec) -> Result<Expr> {
        let mut ti = *new_ti;
        if new_ti.is_string()
            && new_ti.compression == Compression::Dict
            && new_ti.comp_param == TRANSIENT_DICT_ID
            && self.type_info.is_string()
            && self.type_info.compression == Compression::None
            && self.type_info.comp_param > TRANSIENT_DICT_ID
        {
            ti.comp_param = transient_dict(self.type_info.comp_param);
            tracing::trace!(comp_param = ti.comp_param, "substituted transient dictionary id");
        }
        let ExprKind::Case { branches, else_expr } = self.kind else {
            unreachable!("case_add_cast on a non-CASE");
        };
        let mut new_branches = Vec::with_capacity(branches.len());
        for (when, then) in branches {
            new_branches.push((when, then.add_cast(&ti, codec)?));
        }
        let new_else = match else_expr {
            Some(e) => Some(Box::new((*e).add_cast(&ti, codec)?)),
            None => None,
        };
        self.kind = ExprKind::Case { branches: new_branches, else_expr: new_else };
        self.type_info = ti;
        Ok(self)
    }
}

/// Rewrite a constant's datum in place for a cast to `new_ti`.
fn do_cast(
    value: &mut Datum,
    type_info: &mut TypeInfo,
    new_ti: &TypeInfo,
    codec: &dyn DatumCodec,
) -> Result<()> {
    if *type_info == *new_ti {
        return Ok(());
    }
    if new_ti.is_number()
        && (type_info.is_number()
            || type_info.kind == SqlType::Timestamp
            || type_info.kind == SqlType::Bool)
    {
        cast_number(value, type_info, new_ti);
    } else if new_ti.is_string() && type_info.is_string() {
        cast_string(value, new_ti);
    } else if type_info.is_string() {
        let s = std::mem::take(match value {
            Datum::Str(s) => s,
            other => panic!("datum tag mismatch: expected Str, found {:?}", other),
        });
        *value = codec.string_to_datum(&s, new_ti)?;
    } else if new_ti.is_string() {
        let s = codec.datum_to_string(value, type_info)?;
        *value = Datum::Str(truncate_chars(s, new_ti));
    } else {
        return Err(Error::InvalidCast);
    }
    *type_info = *new_ti;
    Ok(())
}

/// Truncating number-to-number conversion. NUMERIC/DECIMAL mantissas are
/// rescaled with repeated ×10/÷10, keeping the same rounding behavior as the
/// executor's fixed-point arithmetic.
fn cast_number(value: &mut Datum, type_info: &TypeInfo, new_ti: &TypeInfo) {
    // Normalize the source to an i64 or f64 view first.
    match type_info.kind {
        SqlType::SmallInt | SqlType::Int | SqlType::BigInt | SqlType::Bool | SqlType::Timestamp => {
            let v: i64 = match type_info.kind {
                SqlType::SmallInt => value.as_smallint() as i64,
                SqlType::Int => value.as_int() as i64,
                SqlType::BigInt => value.as_bigint(),
                SqlType::Timestamp => value.as_time(),
                SqlType::Bool => {
                    if value.as_bool() != 0 {
                        1
                    } else {
                        0
                    }
                }
                _ => unreachable!(),
            };
            *value = match new_ti.kind {
                SqlType::SmallInt => Datum::SmallInt(v as i16),
                SqlType::Int => Datum::Int(v as i32),
                SqlType::BigInt => Datum::BigInt(v),
                SqlType::Float => Datum::Float(v as f32),
                SqlType::Double => Datum::Double(v as f64),
                SqlType::Numeric | SqlType::Decimal => Datum::BigInt(rescale(v, 0, new_ti.scale)),
                _ => unreachable!("non-numeric cast target"),
            };
        }
        SqlType::Float | SqlType::Double => {
            let v: f64 = match type_info.kind {
                SqlType::Float => value.as_float() as f64,
                _ => value.as_double(),
            };
            *value = match new_ti.kind {
                SqlType::SmallInt => Datum::SmallInt(v as i16),
                SqlType::Int => Datum::Int(v as i32),
                SqlType::BigInt => Datum::BigInt(v as i64),
                SqlType::Float => Datum::Float(v as f32),
                SqlType::Double => Datum::Double(v),
                SqlType::Numeric | SqlType::Decimal => {
                    let mut scaled = v;
                    for _ in 0..new_ti.scale {
                        scaled *= 10.0;
                    }
                    Datum::BigInt(scaled as i64)
                }
                _ => unreachable!("non-numeric cast target"),
            };
        }
        SqlType::Numeric | SqlType::Decimal => {
            let mantissa = value.as_bigint();
            *value = match new_ti.kind {
                SqlType::SmallInt => Datum::SmallInt(rescale(mantissa, type_info.scale, 0) as i16),
                SqlType::Int => Datum::Int(rescale(mantissa, type_info.scale, 0) as i32),
                SqlType::BigInt => Datum::BigInt(rescale(mantissa, type_info.scale, 0)),
                SqlType::Float => {
                    let mut v = mantissa as f32;
                    for _ in 0..type_info.scale {
                        v /= 10.0;
                    }
                    Datum::Float(v)
                }
                SqlType::Double => {
                    let mut v = mantissa as f64;
                    for _ in 0..type_info.scale {
                        v /= 10.0;
                    }
                    Datum::Double(v)
                }
                SqlType::Numeric | SqlType::Decimal => {
                    Datum::BigInt(rescale(mantissa, type_info.scale, new_ti.scale))
                }
                _ => unreachable!("non-numeric cast target"),
            };
        }
        _ => unreachable!("non-numeric cast source"),
    }
}

/// Move a fixed-point mantissa between scales; widening multiplies, narrowing
/// divides (truncating toward zero).
fn rescale(mantissa: i64, from_scale: i32, to_scale: i32) -> i64 {
    let mut v = mantissa;
    if to_scale > from_scale {
        for _ in 0..(to_scale - from_scale) {
            v = v.wrapping_mul(10);
        }
    } else {
        for _ in 0..(from_scale - to_scale) {
            v /= 10;
        }
    }
    v
}

/// String-to-string casts retag and, for sized targets, truncate the payload.
fn cast_string(value: &mut Datum, new_ti: &TypeInfo) {
    if let Datum::Str(s) = value {
        if new_ti.kind != SqlType::Text && s.chars().count() > new_ti.dimension.max(0) as usize {
            *s = s.chars().take(new_ti.dimension.max(0) as usize).collect();
        }
    }
}

fn truncate_chars(s: String, ti: &TypeInfo) -> String {
    if ti.kind != SqlType::Text && s.chars().count() > ti.dimension.max(0) as usize {
        s.chars().take(ti.dimension.max(0) as usize).collect()
    } else {
        s
    }
}
