//! String/datum conversion capability
//!
//! Casting a string constant to another type (and back) needs a codec. The
//! analyzer consumes it through [`DatumCodec`]; [`TextCodec`] is the
//! reference implementation used by the engine's SQL text frontend.

use crate::error::{Error, Result};
use crate::types::data_type::{SqlType, TypeInfo};
use crate::types::datum::{format_datum, Datum};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Conversion between SQL text and raw datums, directed by a [`TypeInfo`].
pub trait DatumCodec {
    fn string_to_datum(&self, s: &str, ti: &TypeInfo) -> Result<Datum>;
    fn datum_to_string(&self, d: &Datum, ti: &TypeInfo) -> Result<String>;
}

/// Text codec for SQL literal syntax: `YYYY-MM-DD` dates, `HH:MM:SS` times,
/// `t`/`f` booleans, and plain decimal numerics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl DatumCodec for TextCodec {
    fn string_to_datum(&self, s: &str, ti: &TypeInfo) -> Result<Datum> {
        let s = s.trim();
        match ti.kind {
            SqlType::Bool => parse_bool(s),
            SqlType::SmallInt => s
                .parse::<i16>()
                .map(Datum::SmallInt)
                .map_err(|_| invalid(s, ti)),
            SqlType::Int => s.parse::<i32>().map(Datum::Int).map_err(|_| invalid(s, ti)),
            SqlType::BigInt => s.parse::<i64>().map(Datum::BigInt).map_err(|_| invalid(s, ti)),
            SqlType::Float => s.parse::<f32>().map(Datum::Float).map_err(|_| invalid(s, ti)),
            SqlType::Double => s.parse::<f64>().map(Datum::Double).map_err(|_| invalid(s, ti)),
            SqlType::Numeric | SqlType::Decimal => parse_mantissa(s, ti),
            SqlType::Time => NaiveTime::parse_from_str(s, "%H:%M:%S")
                .map(|t| Datum::Time(t.num_seconds_from_midnight() as i64))
                .map_err(|_| invalid(s, ti)),
            SqlType::Timestamp => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
                })
                .map(|dt| Datum::Time(dt.and_utc().timestamp()))
                .map_err(|_| invalid(s, ti)),
            SqlType::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| {
                    let midnight = d.and_hms_opt(0, 0, 0).expect("midnight is valid");
                    Datum::Time(midnight.and_utc().timestamp())
                })
                .map_err(|_| invalid(s, ti)),
            SqlType::Char | SqlType::Varchar | SqlType::Text => Ok(Datum::Str(s.to_string())),
            SqlType::Null => Err(invalid(s, ti)),
        }
    }

    fn datum_to_string(&self, d: &Datum, ti: &TypeInfo) -> Result<String> {
        match ti.kind {
            SqlType::Time => {
                let secs = d.as_time();
                if !(0..86_400).contains(&secs) {
                    return Err(Error::InvalidValue(format!("time out of range: {}", secs)));
                }
                let t = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)
                    .expect("seconds already range checked");
                Ok(t.format("%H:%M:%S").to_string())
            }
            SqlType::Timestamp => {
                let dt = timestamp_from_epoch(d.as_time())?;
                Ok(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            SqlType::Date => {
                let dt = timestamp_from_epoch(d.as_time())?;
                Ok(dt.date().format("%Y-%m-%d").to_string())
            }
            _ => Ok(format_datum(d, ti)),
        }
    }
}

fn invalid(s: &str, ti: &TypeInfo) -> Error {
    Error::InvalidValue(format!("'{}' is not a valid {}", s, ti.kind))
}

fn parse_bool(s: &str) -> Result<Datum> {
    match s {
        "t" | "T" | "true" | "TRUE" | "1" => Ok(Datum::Bool(1)),
        "f" | "F" | "false" | "FALSE" | "0" => Ok(Datum::Bool(0)),
        _ => Err(Error::InvalidValue(format!("'{}' is not a valid BOOLEAN", s))),
    }
}

/// Parse a decimal literal into a mantissa scaled by `10^ti.scale`. Extra
/// fractional digits are truncated, matching the cast engine's behavior.
fn parse_mantissa(s: &str, ti: &TypeInfo) -> Result<Datum> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1_i64, rest),
        None => (1_i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid(s, ti));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(s, ti));
    }
    let scale = ti.scale.max(0) as usize;
    let mut mantissa: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().map_err(|_| invalid(s, ti))?
    };
    for i in 0..scale {
        let digit = frac.as_bytes().get(i).map(|b| (b - b'0') as i64).unwrap_or(0);
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(digit))
            .ok_or_else(|| invalid(s, ti))?;
    }
    Ok(Datum::BigInt(sign * mantissa))
}

fn timestamp_from_epoch(secs: i64) -> Result<NaiveDateTime> {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| Error::InvalidValue(format!("timestamp out of range: {}", secs)))
}
