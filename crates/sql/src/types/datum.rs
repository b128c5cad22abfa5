//! Value payloads for constants, with the executor's null sentinels
//!
//! A `Datum` carries the raw value; the owning node's [`TypeInfo`] decides how
//! it is interpreted. In particular `BigInt` doubles as the NUMERIC/DECIMAL
//! mantissa (value scaled by `10^scale`) and `Time` holds epoch seconds for
//! all three temporal kinds.

use crate::types::data_type::{SqlType, TypeInfo};
use serde::{Deserialize, Serialize};

/// Null sentinel for BOOLEAN; a byte outside {0, 1}.
pub const NULL_BOOLEAN: i8 = i8::MIN;
pub const NULL_SMALLINT: i16 = i16::MIN;
pub const NULL_INT: i32 = i32::MIN;
/// Also the sentinel for NUMERIC/DECIMAL mantissas and temporal values.
pub const NULL_BIGINT: i64 = i64::MIN;
/// Designated quiet NaN; compared by bit pattern, not by float equality.
pub const NULL_FLOAT: f32 = f32::from_bits(0x7fc0_0000);
pub const NULL_DOUBLE: f64 = f64::from_bits(0x7ff8_0000_0000_0000);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    /// 0, 1, or the `NULL_BOOLEAN` sentinel.
    Bool(i8),
    SmallInt(i16),
    Int(i32),
    /// BIGINT values and NUMERIC/DECIMAL mantissas.
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Epoch seconds for TIME, TIMESTAMP, and DATE.
    Time(i64),
    Str(String),
}

impl Datum {
    pub fn as_bool(&self) -> i8 {
        match self {
            Datum::Bool(v) => *v,
            other => panic!("datum tag mismatch: expected Bool, found {:?}", other),
        }
    }

    pub fn as_smallint(&self) -> i16 {
        match self {
            Datum::SmallInt(v) => *v,
            other => panic!("datum tag mismatch: expected SmallInt, found {:?}", other),
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Datum::Int(v) => *v,
            other => panic!("datum tag mismatch: expected Int, found {:?}", other),
        }
    }

    pub fn as_bigint(&self) -> i64 {
        match self {
            Datum::BigInt(v) => *v,
            other => panic!("datum tag mismatch: expected BigInt, found {:?}", other),
        }
    }

    pub fn as_float(&self) -> f32 {
        match self {
            Datum::Float(v) => *v,
            other => panic!("datum tag mismatch: expected Float, found {:?}", other),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Datum::Double(v) => *v,
            other => panic!("datum tag mismatch: expected Double, found {:?}", other),
        }
    }

    pub fn as_time(&self) -> i64 {
        match self {
            Datum::Time(v) => *v,
            other => panic!("datum tag mismatch: expected Time, found {:?}", other),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Datum::Str(s) => s,
            other => panic!("datum tag mismatch: expected Str, found {:?}", other),
        }
    }
}

/// The sentinel datum for a NULL constant of the given type.
///
/// String kinds use an empty string; the owning constant carries `is_null`
/// separately, so "" stays ambiguous with a zero-length literal by design of
/// the executor's datum layout.
pub fn null_datum(ti: &TypeInfo) -> Datum {
    match ti.kind {
        SqlType::Bool => Datum::Bool(NULL_BOOLEAN),
        SqlType::SmallInt => Datum::SmallInt(NULL_SMALLINT),
        SqlType::Int => Datum::Int(NULL_INT),
        SqlType::BigInt | SqlType::Numeric | SqlType::Decimal => Datum::BigInt(NULL_BIGINT),
        SqlType::Float => Datum::Float(NULL_FLOAT),
        SqlType::Double => Datum::Double(NULL_DOUBLE),
        SqlType::Time | SqlType::Timestamp | SqlType::Date => Datum::Time(NULL_BIGINT),
        SqlType::Char | SqlType::Varchar | SqlType::Text => Datum::Str(String::new()),
        SqlType::Null => Datum::BigInt(0),
    }
}

/// Compare two datums under the interpretation of `ti`.
///
/// Floats compare by bit pattern so that the NaN null sentinels are equal to
/// themselves.
pub fn datum_equal(ti: &TypeInfo, left: &Datum, right: &Datum) -> bool {
    match ti.kind {
        SqlType::Bool => left.as_bool() == right.as_bool(),
        SqlType::Char | SqlType::Varchar | SqlType::Text => left.as_str() == right.as_str(),
        SqlType::Numeric | SqlType::Decimal | SqlType::BigInt | SqlType::Null => {
            left.as_bigint() == right.as_bigint()
        }
        SqlType::Int => left.as_int() == right.as_int(),
        SqlType::SmallInt => left.as_smallint() == right.as_smallint(),
        SqlType::Float => left.as_float().to_bits() == right.as_float().to_bits(),
        SqlType::Double => left.as_double().to_bits() == right.as_double().to_bits(),
        SqlType::Time | SqlType::Timestamp | SqlType::Date => left.as_time() == right.as_time(),
    }
}

/// Render a datum for diagnostics. NUMERIC mantissas are rendered with the
/// decimal point restored from `ti.scale`; temporals print raw epoch seconds.
pub fn format_datum(d: &Datum, ti: &TypeInfo) -> String {
    match ti.kind {
        SqlType::Bool => {
            if d.as_bool() == 0 {
                "f".to_string()
            } else {
                "t".to_string()
            }
        }
        SqlType::Numeric | SqlType::Decimal => format_mantissa(d.as_bigint(), ti.scale),
        _ => match d {
            Datum::Bool(v) => v.to_string(),
            Datum::SmallInt(v) => v.to_string(),
            Datum::Int(v) => v.to_string(),
            Datum::BigInt(v) => v.to_string(),
            Datum::Float(v) => v.to_string(),
            Datum::Double(v) => v.to_string(),
            Datum::Time(v) => v.to_string(),
            Datum::Str(s) => s.clone(),
        },
    }
}

fn format_mantissa(mantissa: i64, scale: i32) -> String {
    if scale <= 0 {
        return mantissa.to_string();
    }
    let divisor = 10_i64.pow(scale as u32);
    let sign = if mantissa < 0 { "-" } else { "" };
    let magnitude = mantissa.unsigned_abs();
    let whole = magnitude / divisor as u64;
    let frac = magnitude % divisor as u64;
    format!("{}{}.{:0width$}", sign, whole, frac, width = scale as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_type::TypeInfo;

    #[test]
    fn null_sentinels_are_bit_exact() {
        assert_eq!(NULL_SMALLINT, i16::MIN);
        assert_eq!(NULL_INT, i32::MIN);
        assert_eq!(NULL_BIGINT, i64::MIN);
        assert!(NULL_FLOAT.is_nan());
        assert!(NULL_DOUBLE.is_nan());
        assert!(NULL_BOOLEAN != 0 && NULL_BOOLEAN != 1);
    }

    #[test]
    fn nan_sentinels_compare_equal() {
        let ti = TypeInfo::new(SqlType::Double);
        assert!(datum_equal(&ti, &null_datum(&ti), &null_datum(&ti)));
        let ti = TypeInfo::new(SqlType::Float);
        assert!(datum_equal(&ti, &null_datum(&ti), &null_datum(&ti)));
    }

    #[test]
    fn mantissa_formatting() {
        let ti = TypeInfo::numeric(SqlType::Numeric, 10, 2, false);
        assert_eq!(format_datum(&Datum::BigInt(700), &ti), "7.00");
        assert_eq!(format_datum(&Datum::BigInt(-1234), &ti), "-12.34");
        let ti0 = TypeInfo::numeric(SqlType::Numeric, 10, 0, false);
        assert_eq!(format_datum(&Datum::BigInt(42), &ti0), "42");
    }
}
