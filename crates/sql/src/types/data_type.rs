//! SQL type descriptors attached to every analyzed expression

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL type kinds understood by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Numeric,
    Decimal,
    Char,
    Varchar,
    Text,
    Time,
    Timestamp,
    Date,
    /// The type of an untyped NULL literal.
    Null,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Bool => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Int => "INT",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::Varchar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Date => "DATE",
            SqlType::Null => "NULL",
        };
        write!(f, "{}", name)
    }
}

/// String compression scheme. Only string kinds carry a non-`None` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    Dict,
}

/// Dictionary ids at or below this value denote planner-synthesized
/// (transient) dictionaries; catalog dictionaries are strictly positive.
pub const TRANSIENT_DICT_ID: i32 = 0;

/// Involutive mapping between a dictionary id and its transient counterpart.
pub fn transient_dict(dict_id: i32) -> i32 {
    -dict_id
}

/// The analyzed type of an expression: kind plus precision/length (`dimension`),
/// numeric `scale`, nullability, and string compression metadata.
///
/// Two `TypeInfo`s are equal iff all fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    pub kind: SqlType,
    /// Precision for numerics, length for strings, fractional-second digits
    /// for temporals.
    pub dimension: i32,
    /// Numeric scale; zero for everything else.
    pub scale: i32,
    pub not_null: bool,
    pub compression: Compression,
    /// Dictionary id when `compression` is `Dict`.
    pub comp_param: i32,
}

impl TypeInfo {
    pub fn new(kind: SqlType) -> Self {
        Self {
            kind,
            dimension: 0,
            scale: 0,
            not_null: false,
            compression: Compression::None,
            comp_param: 0,
        }
    }

    pub fn with_notnull(kind: SqlType, not_null: bool) -> Self {
        Self { not_null, ..Self::new(kind) }
    }

    pub fn with_dimension(kind: SqlType, dimension: i32, not_null: bool) -> Self {
        Self { dimension, not_null, ..Self::new(kind) }
    }

    pub fn numeric(kind: SqlType, dimension: i32, scale: i32, not_null: bool) -> Self {
        Self { dimension, scale, not_null, ..Self::new(kind) }
    }

    pub fn string(
        kind: SqlType,
        dimension: i32,
        not_null: bool,
        compression: Compression,
        comp_param: i32,
    ) -> Self {
        Self { kind, dimension, scale: 0, not_null, compression, comp_param }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.kind,
            SqlType::SmallInt
                | SqlType::Int
                | SqlType::BigInt
                | SqlType::Float
                | SqlType::Double
                | SqlType::Numeric
                | SqlType::Decimal
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, SqlType::SmallInt | SqlType::Int | SqlType::BigInt)
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self.kind, SqlType::Numeric | SqlType::Decimal)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, SqlType::Char | SqlType::Varchar | SqlType::Text)
    }

    pub fn is_time(&self) -> bool {
        matches!(self.kind, SqlType::Time | SqlType::Timestamp | SqlType::Date)
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == SqlType::Bool
    }

    pub fn is_dict_encoded(&self) -> bool {
        self.compression == Compression::Dict
    }

    /// Whether a value of this type can be cast to `target`.
    ///
    /// Casts within a kind (precision/scale/encoding changes) are always
    /// legal, as are casts from or to strings, between numbers, from
    /// TIMESTAMP/DATE to numbers (epoch arithmetic), between DATE and
    /// TIMESTAMP, and from BOOLEAN to numbers. TIME never mixes with the
    /// other temporal kinds.
    pub fn is_castable(&self, target: &TypeInfo) -> bool {
        if self.kind == target.kind {
            true
        } else if self.is_string() || target.is_string() {
            true
        } else if self.is_number() && target.is_number() {
            true
        } else if matches!(self.kind, SqlType::Timestamp | SqlType::Date) && target.is_number() {
            true
        } else if self.kind == SqlType::Date && target.kind == SqlType::Timestamp {
            true
        } else if self.kind == SqlType::Timestamp && target.kind == SqlType::Date {
            true
        } else {
            self.kind == SqlType::Bool && target.is_number()
        }
    }

    pub fn type_name(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind, self.dimension, self.scale)?;
        if self.compression == Compression::Dict {
            write!(f, " DICT({})", self.comp_param)?;
        }
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn castability_partial_order() {
        let int = TypeInfo::new(SqlType::Int);
        let bigint = TypeInfo::new(SqlType::BigInt);
        let text = TypeInfo::new(SqlType::Text);
        let time = TypeInfo::new(SqlType::Time);
        let timestamp = TypeInfo::new(SqlType::Timestamp);
        let date = TypeInfo::new(SqlType::Date);
        let boolean = TypeInfo::new(SqlType::Bool);

        assert!(int.is_castable(&bigint));
        assert!(bigint.is_castable(&int));
        assert!(text.is_castable(&int));
        assert!(int.is_castable(&text));
        assert!(date.is_castable(&timestamp));
        assert!(timestamp.is_castable(&date));
        assert!(timestamp.is_castable(&bigint));
        assert!(boolean.is_castable(&int));

        assert!(!time.is_castable(&timestamp));
        assert!(!timestamp.is_castable(&time));
        assert!(!int.is_castable(&boolean));
        assert!(!boolean.is_castable(&date));
    }

    #[test]
    fn equality_is_field_wise() {
        let a = TypeInfo::numeric(SqlType::Numeric, 10, 2, false);
        let mut b = a;
        assert_eq!(a, b);
        b.scale = 3;
        assert_ne!(a, b);

        let dict = TypeInfo::string(SqlType::Text, 0, false, Compression::Dict, 17);
        let plain = TypeInfo::string(SqlType::Text, 0, false, Compression::None, 17);
        assert_ne!(dict, plain);
    }

    #[test]
    fn transient_dict_is_involutive() {
        assert_eq!(transient_dict(transient_dict(42)), 42);
        assert!(transient_dict(42) <= TRANSIENT_DICT_ID);
    }
}
