//! Declared-type driven value extraction.
//!
//! `ValueCodec::decode` turns a driver cell into the canonical `Datum` for its declared
//! column type. The `read_*` helpers apply a caller's requested representation to a stored
//! value and report whether it was NULL.

use bytes::{Buf, Bytes};
use chrono::{FixedOffset, TimeZone};

use shard_common::datum::{Datum, LargeObject, RawCell};
use shard_common::error::CodecError;
use shard_common::types::{SqlType, StreamKind, TargetType};

/// A byte stream over one column value.
pub type InputStream = bytes::buf::Reader<Bytes>;

pub struct ValueCodec;

impl ValueCodec {
    /// Canonical representation for a declared type. `None` for BIT, which depends on the
    /// cell, and for types the codec does not understand.
    pub fn target_for(declared: &SqlType) -> Option<TargetType> {
        let target = match declared {
            SqlType::Bit | SqlType::Other(_) => return None,
            SqlType::Boolean => TargetType::Boolean,
            SqlType::TinyInt => TargetType::Int8,
            SqlType::SmallInt => TargetType::Int16,
            SqlType::Integer => TargetType::Int32,
            SqlType::BigInt => TargetType::Int64,
            SqlType::Real => TargetType::Float32,
            SqlType::Float | SqlType::Double => TargetType::Float64,
            SqlType::Decimal | SqlType::Numeric => TargetType::Decimal,
            SqlType::Char
            | SqlType::VarChar
            | SqlType::LongVarChar
            | SqlType::NChar
            | SqlType::NVarChar => TargetType::Text,
            SqlType::Clob
            | SqlType::Binary
            | SqlType::VarBinary
            | SqlType::LongVarBinary
            | SqlType::Blob => TargetType::Lob,
            SqlType::Date => TargetType::Date,
            SqlType::Time => TargetType::Time,
            SqlType::Timestamp => TargetType::Timestamp,
        };
        Some(target)
    }

    /// Decode one driver cell. `None` is SQL NULL and decodes to `Datum::Null`.
    pub fn decode(cell: Option<RawCell>, declared: &SqlType) -> Result<Datum, CodecError> {
        let Some(cell) = cell else {
            return Ok(Datum::Null);
        };
        match declared {
            SqlType::Bit => decode_bit(cell),
            SqlType::Other(_) => Ok(Datum::Other(Box::new(cell))),
            declared => match Self::target_for(declared) {
                Some(target) => loose(cell).convert(target),
                None => Ok(Datum::Other(Box::new(cell))),
            },
        }
    }
}

/// Driver cell as a canonical value, before the declared type is applied.
fn loose(cell: RawCell) -> Datum {
    match cell {
        RawCell::Bool(b) => Datum::Boolean(b),
        RawCell::Int(v) => Datum::Int64(v),
        RawCell::Float(v) => Datum::Float64(v),
        RawCell::Text(s) => Datum::Text(s),
        RawCell::Bytes(b) => Datum::Lob(LargeObject::new(b)),
        RawCell::Date(d) => Datum::Date(d),
        RawCell::Time(t) => Datum::Time(t),
        RawCell::Timestamp(ts) => Datum::Timestamp(ts),
    }
}

/// BIT(1) is a boolean; wider BIT strings pass through as raw bytes.
fn decode_bit(cell: RawCell) -> Result<Datum, CodecError> {
    match cell {
        RawCell::Bool(b) => Ok(Datum::Boolean(b)),
        RawCell::Int(v) => Ok(Datum::Boolean(v != 0)),
        RawCell::Bytes(b) if b.len() == 1 => Ok(Datum::Boolean(b[0] != 0)),
        RawCell::Bytes(b) => Ok(Datum::Bytes(b.to_vec())),
        RawCell::Text(s) => match s.as_str() {
            "0" | "1" => Ok(Datum::Boolean(s == "1")),
            _ => Ok(Datum::Bytes(s.into_bytes())),
        },
        other => Err(CodecError::TypeMismatch {
            expected: "bit".to_string(),
            got: loose(other).type_name().to_string(),
        }),
    }
}

/// Convert a stored value for a reader. NULL yields the target's zero value and `true`.
pub fn read_value(value: &Datum, target: TargetType) -> Result<(Datum, bool), CodecError> {
    if value.is_null() {
        return Ok((target.zero_value(), true));
    }
    Ok((value.convert(target)?, false))
}

/// Date/time read against an explicit zone.
///
/// Stored timestamps are UTC wall-clock values and are shifted into `calendar` before the
/// conversion; DATE and TIME values carry no zone and are returned as stored.
pub fn read_calendar_value(
    value: &Datum,
    target: TargetType,
    calendar: &FixedOffset,
) -> Result<(Datum, bool), CodecError> {
    if !target.is_temporal() {
        return Err(CodecError::UnsupportedType(format!(
            "{target} is not a date/time type"
        )));
    }
    if value.is_null() {
        return Ok((target.zero_value(), true));
    }
    let local = match value {
        Datum::Timestamp(ts) => Datum::Timestamp(calendar.from_utc_datetime(ts).naive_local()),
        Datum::Text(_) => match value.convert(TargetType::Timestamp) {
            Ok(Datum::Timestamp(ts)) => {
                Datum::Timestamp(calendar.from_utc_datetime(&ts).naive_local())
            }
            _ => value.clone(),
        },
        other => other.clone(),
    };
    Ok((local.convert(target)?, false))
}

/// Open a byte stream over a stored value. NULL yields an empty stream and `true`.
///
/// ASCII replaces non-ASCII characters with `?`; UNICODE is UTF-16BE; BINARY is the raw
/// bytes of binary values and the UTF-8 bytes of text.
pub fn read_stream(value: &Datum, kind: StreamKind) -> Result<(InputStream, bool), CodecError> {
    if value.is_null() {
        return Ok((Bytes::new().reader(), true));
    }
    let bytes = match kind {
        StreamKind::Binary => match value {
            Datum::Lob(lob) => lob.bytes(),
            Datum::Bytes(b) => Bytes::from(b.clone()),
            Datum::Text(s) => Bytes::from(s.clone().into_bytes()),
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: "binary stream".to_string(),
                    got: other.type_name().to_string(),
                })
            }
        },
        StreamKind::Ascii => {
            let text = text_of(value)?;
            Bytes::from(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                    .collect::<Vec<u8>>(),
            )
        }
        StreamKind::Unicode => {
            let text = text_of(value)?;
            Bytes::from(
                text.encode_utf16()
                    .flat_map(u16::to_be_bytes)
                    .collect::<Vec<u8>>(),
            )
        }
    };
    Ok((bytes.reader(), false))
}

fn text_of(value: &Datum) -> Result<String, CodecError> {
    match value.convert(TargetType::Text)? {
        Datum::Text(s) => Ok(s),
        other => Err(CodecError::TypeMismatch {
            expected: "text".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}
