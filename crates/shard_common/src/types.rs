use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datum::{Datum, LargeObject};
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub u64);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard_{}", self.0)
    }
}

/// Declared SQL type of a physical column, as reported by the shard driver's metadata.
///
/// Closed over the types the codec understands; anything else is carried as
/// `Other` with the driver's type name and decoded as an opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    Clob,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Date,
    Time,
    Timestamp,
    Other(String),
}

impl SqlType {
    pub fn name(&self) -> &str {
        match self {
            SqlType::Bit => "BIT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Decimal => "DECIMAL",
            SqlType::Numeric => "NUMERIC",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::LongVarChar => "LONGVARCHAR",
            SqlType::NChar => "NCHAR",
            SqlType::NVarChar => "NVARCHAR",
            SqlType::Clob => "CLOB",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::LongVarBinary => "LONGVARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Other(name) => name.as_str(),
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SqlType {
    type Err = Infallible;

    /// Unknown names never fail: they become `SqlType::Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "BIT" => SqlType::Bit,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            "TINYINT" | "INT1" => SqlType::TinyInt,
            "SMALLINT" | "INT2" => SqlType::SmallInt,
            "INTEGER" | "INT" | "INT4" => SqlType::Integer,
            "BIGINT" | "INT8" => SqlType::BigInt,
            "REAL" | "FLOAT4" => SqlType::Real,
            "FLOAT" => SqlType::Float,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => SqlType::Double,
            "DECIMAL" => SqlType::Decimal,
            "NUMERIC" => SqlType::Numeric,
            "CHAR" => SqlType::Char,
            "VARCHAR" | "TEXT" => SqlType::VarChar,
            "LONGVARCHAR" => SqlType::LongVarChar,
            "NCHAR" => SqlType::NChar,
            "NVARCHAR" => SqlType::NVarChar,
            "CLOB" => SqlType::Clob,
            "BINARY" => SqlType::Binary,
            "VARBINARY" | "BYTEA" => SqlType::VarBinary,
            "LONGVARBINARY" => SqlType::LongVarBinary,
            "BLOB" => SqlType::Blob,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" | "DATETIME" => SqlType::Timestamp,
            _ => SqlType::Other(upper),
        })
    }
}

/// The representation a caller asks for when reading a column value.
///
/// `Native` returns the canonical value the codec produced, unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Native,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    Bytes,
    Lob,
    Date,
    Time,
    Timestamp,
}

impl TargetType {
    pub fn name(&self) -> &'static str {
        match self {
            TargetType::Native => "native",
            TargetType::Boolean => "boolean",
            TargetType::Int8 => "int8",
            TargetType::Int16 => "int16",
            TargetType::Int32 => "int32",
            TargetType::Int64 => "int64",
            TargetType::Float32 => "float32",
            TargetType::Float64 => "float64",
            TargetType::Decimal => "decimal",
            TargetType::Text => "text",
            TargetType::Bytes => "bytes",
            TargetType::Lob => "lob",
            TargetType::Date => "date",
            TargetType::Time => "time",
            TargetType::Timestamp => "timestamp",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            TargetType::Date | TargetType::Time | TargetType::Timestamp
        )
    }

    /// The value handed back in place of a SQL NULL. `wasNull()` is what tells the
    /// caller the zero is a substitute.
    ///
    /// Temporal types and `Native` have no meaningful zero and yield `Datum::Null`.
    pub fn zero_value(&self) -> Datum {
        match self {
            TargetType::Boolean => Datum::Boolean(false),
            TargetType::Int8 => Datum::Int8(0),
            TargetType::Int16 => Datum::Int16(0),
            TargetType::Int32 => Datum::Int32(0),
            TargetType::Int64 => Datum::Int64(0),
            TargetType::Float32 => Datum::Float32(0.0),
            TargetType::Float64 => Datum::Float64(0.0),
            TargetType::Decimal => Datum::Decimal(0, 0),
            TargetType::Text => Datum::Text(String::new()),
            TargetType::Bytes => Datum::Bytes(Vec::new()),
            TargetType::Lob => Datum::Lob(LargeObject::default()),
            TargetType::Native | TargetType::Date | TargetType::Time | TargetType::Timestamp => {
                Datum::Null
            }
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Byte-stream flavours served by `get_input_stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Text as ASCII bytes; non-ASCII characters become `?`.
    Ascii,
    /// Text as UTF-16 big-endian code units.
    Unicode,
    /// Raw bytes.
    Binary,
}

impl FromStr for StreamKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" => Ok(StreamKind::Ascii),
            "unicode" => Ok(StreamKind::Unicode),
            "binary" => Ok(StreamKind::Binary),
            _ => Err(CodecError::UnsupportedStreamKind(s.to_string())),
        }
    }
}
