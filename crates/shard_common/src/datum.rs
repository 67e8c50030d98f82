use std::fmt;

use bytes::{Buf, Bytes};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::TargetType;

/// A cell as handed over by a shard driver, before the declared column type is applied.
///
/// Drivers are loose about representation (a DECIMAL may arrive as text, a SMALLINT
/// as a 64-bit integer); the codec resolves that against the declared `SqlType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Bool(b) => write!(f, "{}", b),
            RawCell::Int(v) => write!(f, "{}", v),
            RawCell::Float(v) => write!(f, "{}", v),
            RawCell::Text(s) => write!(f, "{}", s),
            RawCell::Bytes(b) => write_hex(f, b),
            RawCell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            RawCell::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            RawCell::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Opaque handle to a binary or character large object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LargeObject(Bytes);

impl LargeObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Shares the underlying buffer; no copy.
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// A `std::io::Read` view over the object's contents.
    pub fn reader(&self) -> bytes::buf::Reader<Bytes> {
        self.0.clone().reader()
    }
}

impl From<Vec<u8>> for LargeObject {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

/// A single canonical value. Every shard cell is decoded into one of these before the
/// merge layer looks at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    /// Multi-bit BIT strings, passed through as raw bytes.
    Bytes(Vec<u8>),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Fixed-point decimal: mantissa × 10^(-scale).
    /// e.g. Decimal(12345, 2) = 123.45
    ///
    /// Decoded values carry at most `DECIMAL_MAX_PRECISION` digits.
    Decimal(i128, u8),
    Text(String),
    Lob(LargeObject),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// A value of a declared type the codec does not understand, carried unexamined.
    Other(Box<RawCell>),
}

impl Datum {
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Boolean(_) => "boolean",
            Datum::Bytes(_) => "bytes",
            Datum::Int8(_) => "int8",
            Datum::Int16(_) => "int16",
            Datum::Int32(_) => "int32",
            Datum::Int64(_) => "int64",
            Datum::Float32(_) => "float32",
            Datum::Float64(_) => "float64",
            Datum::Decimal(_, _) => "decimal",
            Datum::Text(_) => "text",
            Datum::Lob(_) => "lob",
            Datum::Date(_) => "date",
            Datum::Time(_) => "time",
            Datum::Timestamp(_) => "timestamp",
            Datum::Other(_) => "other",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer widths only.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int8(v) => Some(i64::from(*v)),
            Datum::Int16(v) => Some(i64::from(*v)),
            Datum::Int32(v) => Some(i64::from(*v)),
            Datum::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Float32(v) => Some(f64::from(*v)),
            Datum::Float64(v) => Some(*v),
            Datum::Decimal(m, s) => Some(*m as f64 / 10f64.powi(*s as i32)),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Try to add two datums (for SUM recomputation).
    ///
    /// Integers widen to Int64 and decimals keep the larger scale; both give None on
    /// overflow. Anything involving a float becomes Float64.
    pub fn add(&self, other: &Datum) -> Option<Datum> {
        match (self, other) {
            (Datum::Decimal(a, sa), Datum::Decimal(b, sb)) => decimal_add(*a, *sa, *b, *sb),
            (Datum::Decimal(a, sa), o) | (o, Datum::Decimal(a, sa)) if o.as_i64().is_some() => {
                let b = i128::from(o.as_i64()?).checked_mul(pow10(u32::from(*sa))?)?;
                decimal_add(*a, *sa, b, *sa)
            }
            _ => {
                if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
                    return a.checked_add(b).map(Datum::Int64);
                }
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => Some(Datum::Float64(a + b)),
                    _ => None,
                }
            }
        }
    }

    /// Create a Decimal from a string like "123.45" or "-0.001".
    ///
    /// None if the text is not a decimal literal or needs more than
    /// `DECIMAL_MAX_PRECISION` digits.
    pub fn parse_decimal(s: &str) -> Option<Datum> {
        let s = s.trim();
        if !is_decimal_literal(s) {
            return None;
        }
        let (int_part, frac_part) = if let Some(dot_pos) = s.find('.') {
            (&s[..dot_pos], &s[dot_pos + 1..])
        } else {
            (s, "")
        };
        if frac_part.len() > usize::from(DECIMAL_MAX_PRECISION) {
            return None;
        }
        let scale = u8::try_from(frac_part.len()).ok()?;
        let combined = format!("{}{}", int_part, frac_part);
        let digits = combined
            .trim_start_matches(&['+', '-'][..])
            .trim_start_matches('0')
            .len();
        if digits > usize::from(DECIMAL_MAX_PRECISION) {
            return None;
        }
        let mantissa: i128 = combined.parse().ok()?;
        Some(Datum::Decimal(mantissa, scale))
    }

    /// Convert this value to the caller's requested representation.
    ///
    /// NULL converts to NULL; substituting a zero value is the reader's job.
    pub fn convert(&self, target: TargetType) -> Result<Datum, CodecError> {
        if self.is_null() {
            return Ok(Datum::Null);
        }
        match target {
            TargetType::Native => Ok(self.clone()),
            TargetType::Boolean => self.to_bool().map(Datum::Boolean),
            TargetType::Int8 => {
                let v = self.to_i64(target)?;
                i8::try_from(v)
                    .map(Datum::Int8)
                    .map_err(|_| self.out_of_range(target))
            }
            TargetType::Int16 => {
                let v = self.to_i64(target)?;
                i16::try_from(v)
                    .map(Datum::Int16)
                    .map_err(|_| self.out_of_range(target))
            }
            TargetType::Int32 => {
                let v = self.to_i64(target)?;
                i32::try_from(v)
                    .map(Datum::Int32)
                    .map_err(|_| self.out_of_range(target))
            }
            TargetType::Int64 => self.to_i64(target).map(Datum::Int64),
            TargetType::Float32 => {
                let v = self.to_f64(target)?;
                if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                    return Err(self.out_of_range(target));
                }
                Ok(Datum::Float32(v as f32))
            }
            TargetType::Float64 => self.to_f64(target).map(Datum::Float64),
            TargetType::Decimal => match self {
                Datum::Decimal(_, _) => Ok(self.clone()),
                Datum::Float32(_) | Datum::Float64(_) => {
                    let v = self.to_f64(target)?;
                    if !v.is_finite() {
                        return Err(self.out_of_range(target));
                    }
                    Datum::parse_decimal(&v.to_string()).ok_or_else(|| self.out_of_range(target))
                }
                Datum::Text(s) => match Datum::parse_decimal(s) {
                    Some(d) => Ok(d),
                    None if is_decimal_literal(s.trim()) => Err(self.out_of_range(target)),
                    None => Err(self.mismatch(target)),
                },
                _ => self.to_i64(target).map(|v| Datum::Decimal(v as i128, 0)),
            },
            TargetType::Text => match self {
                Datum::Text(s) => Ok(Datum::Text(s.clone())),
                Datum::Lob(lob) => String::from_utf8(lob.as_bytes().to_vec())
                    .map(Datum::Text)
                    .map_err(|_| self.mismatch(target)),
                other => Ok(Datum::Text(other.to_string())),
            },
            TargetType::Bytes => match self {
                Datum::Bytes(b) => Ok(Datum::Bytes(b.clone())),
                Datum::Lob(lob) => Ok(Datum::Bytes(lob.as_bytes().to_vec())),
                Datum::Text(s) => Ok(Datum::Bytes(s.as_bytes().to_vec())),
                _ => Err(self.mismatch(target)),
            },
            TargetType::Lob => match self {
                Datum::Lob(_) => Ok(self.clone()),
                Datum::Bytes(b) => Ok(Datum::Lob(LargeObject::from(b.clone()))),
                Datum::Text(s) => Ok(Datum::Lob(LargeObject::from(s.as_bytes().to_vec()))),
                _ => Err(self.mismatch(target)),
            },
            TargetType::Date => match self {
                Datum::Date(_) => Ok(self.clone()),
                Datum::Timestamp(ts) => Ok(Datum::Date(ts.date())),
                Datum::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Datum::Date)
                    .map_err(|_| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
            TargetType::Time => match self {
                Datum::Time(_) => Ok(self.clone()),
                Datum::Timestamp(ts) => Ok(Datum::Time(ts.time())),
                Datum::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .map(Datum::Time)
                    .map_err(|_| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
            TargetType::Timestamp => match self {
                Datum::Timestamp(_) => Ok(self.clone()),
                Datum::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(Datum::Timestamp)
                    .ok_or_else(|| self.out_of_range(target)),
                Datum::Text(s) => parse_timestamp(s.trim())
                    .map(Datum::Timestamp)
                    .ok_or_else(|| self.mismatch(target)),
                _ => Err(self.mismatch(target)),
            },
        }
    }

    fn to_bool(&self) -> Result<bool, CodecError> {
        match self {
            Datum::Boolean(b) => Ok(*b),
            Datum::Bytes(b) => Ok(b.iter().any(|x| *x != 0)),
            Datum::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Ok(true),
                "false" | "f" | "0" | "no" | "n" => Ok(false),
                _ => Err(self.mismatch(TargetType::Boolean)),
            },
            other => other
                .as_i64()
                .map(|v| v != 0)
                .ok_or_else(|| other.mismatch(TargetType::Boolean)),
        }
    }

    fn to_i64(&self, target: TargetType) -> Result<i64, CodecError> {
        match self {
            Datum::Boolean(b) => Ok(i64::from(*b)),
            Datum::Float32(v) => float_to_i64(f64::from(*v)).ok_or_else(|| self.out_of_range(target)),
            Datum::Float64(v) => float_to_i64(*v).ok_or_else(|| self.out_of_range(target)),
            Datum::Decimal(m, s) => {
                // |m| < 10^39, so any scale past i128's range truncates to zero.
                let whole = pow10(u32::from(*s)).map_or(0, |p| m / p);
                i64::try_from(whole).map_err(|_| self.out_of_range(target))
            }
            Datum::Text(s) => s.trim().parse::<i64>().map_err(|_| self.mismatch(target)),
            other => other.as_i64().ok_or_else(|| other.mismatch(target)),
        }
    }

    fn to_f64(&self, target: TargetType) -> Result<f64, CodecError> {
        match self {
            Datum::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Datum::Text(s) => s.trim().parse::<f64>().map_err(|_| self.mismatch(target)),
            other => other.as_f64().ok_or_else(|| other.mismatch(target)),
        }
    }

    fn mismatch(&self, target: TargetType) -> CodecError {
        CodecError::TypeMismatch {
            expected: target.name().to_string(),
            got: self.type_name().to_string(),
        }
    }

    fn out_of_range(&self, target: TargetType) -> CodecError {
        CodecError::ValueOutOfRange {
            value: self.to_string(),
            target: target.name(),
        }
    }
}

/// Optional sign, digits, and at most one decimal point; at least one digit.
fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    let mut digits = 0;
    let mut dots = 0;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn float_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\\x")?;
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Bytes(b) => write_hex(f, b),
            Datum::Int8(v) => write!(f, "{}", v),
            Datum::Int16(v) => write!(f, "{}", v),
            Datum::Int32(v) => write!(f, "{}", v),
            Datum::Int64(v) => write!(f, "{}", v),
            Datum::Float32(v) => write!(f, "{}", v),
            Datum::Float64(v) => write!(f, "{}", v),
            Datum::Decimal(m, s) => write!(f, "{}", decimal_to_string(*m, *s)),
            Datum::Text(s) => write!(f, "{}", s),
            Datum::Lob(lob) => write_hex(f, lob.as_bytes()),
            Datum::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Datum::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Datum::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Datum::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// A row is an ordered list of datums. Once captured it is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedRow {
    pub values: Vec<Datum>,
}

impl OwnedRow {
    pub fn new(values: Vec<Datum>) -> Self {
        Self { values }
    }

    /// 0-based access; column indices in the result API are 1-based.
    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for OwnedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

// ── Decimal helper functions ────────────────────────────────────────────

/// Widest DECIMAL/NUMERIC a shard value may carry, in significant digits.
pub const DECIMAL_MAX_PRECISION: u8 = 38;

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

/// Convert a (mantissa, scale) decimal to its string representation.
/// e.g. (12345, 2) → "123.45", (-1, 3) → "-0.001", (100, 0) → "100"
pub fn decimal_to_string(mantissa: i128, scale: u8) -> String {
    if scale == 0 {
        return mantissa.to_string();
    }
    let negative = mantissa < 0;
    let s = mantissa.unsigned_abs().to_string();
    let scale = scale as usize;
    let result = if s.len() <= scale {
        let zeros = scale - s.len();
        format!("0.{}{}", "0".repeat(zeros), s)
    } else {
        let (int_part, frac_part) = s.split_at(s.len() - scale);
        format!("{}.{}", int_part, frac_part)
    };
    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Normalize two decimals to the same scale, returning (a_normalized, b_normalized).
/// None if the rescaled mantissa does not fit in an i128.
pub fn decimal_normalize(a: i128, sa: u8, b: i128, sb: u8) -> Option<(i128, i128)> {
    if sa == sb {
        Some((a, b))
    } else if sa > sb {
        let diff = u32::from(sa - sb);
        Some((a, b.checked_mul(pow10(diff)?)?))
    } else {
        let diff = u32::from(sb - sa);
        Some((a.checked_mul(pow10(diff)?)?, b))
    }
}

/// Add two decimals, returning a Datum::Decimal with the larger scale.
fn decimal_add(a: i128, sa: u8, b: i128, sb: u8) -> Option<Datum> {
    let max_scale = sa.max(sb);
    let (na, nb) = decimal_normalize(a, sa, b, sb)?;
    Some(Datum::Decimal(na.checked_add(nb)?, max_scale))
}

/// Remove trailing zeros from a decimal for canonical form.
pub fn decimal_trim(mut mantissa: i128, mut scale: u8) -> (i128, u8) {
    if mantissa == 0 {
        return (0, 0);
    }
    while scale > 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        scale -= 1;
    }
    (mantissa, scale)
}

/// Divide two decimals with a target result scale, rounding half away from zero.
pub fn decimal_div(a: i128, sa: u8, b: i128, sb: u8, result_scale: u8) -> Option<Datum> {
    if b == 0 {
        return None;
    }
    // a/10^sa ÷ b/10^sb = (a × 10^(sb + rs + 1 - sa)) / b, in units of 10^-(rs+1)
    let shift = i32::from(sb) + i32::from(result_scale) + 1 - i32::from(sa);
    let (num, den) = if shift >= 0 {
        (a.checked_mul(pow10(shift as u32)?)?, b)
    } else {
        (a, b.checked_mul(pow10((-shift) as u32)?)?)
    };
    let q = num.checked_div(den)?;
    let rounded = if q >= 0 { q.checked_add(5)? / 10 } else { q.checked_sub(5)? / 10 };
    Some(Datum::Decimal(rounded, result_scale))
}

#[cfg(test)]
mod decimal_tests {
    use super::*;

    #[test]
    fn test_decimal_to_string() {
        assert_eq!(decimal_to_string(12345, 2), "123.45");
        assert_eq!(decimal_to_string(-12345, 2), "-123.45");
        assert_eq!(decimal_to_string(1, 3), "0.001");
        assert_eq!(decimal_to_string(100, 0), "100");
        assert_eq!(decimal_to_string(0, 2), "0.00");
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(Datum::parse_decimal("123.45"), Some(Datum::Decimal(12345, 2)));
        assert_eq!(Datum::parse_decimal("-0.001"), Some(Datum::Decimal(-1, 3)));
        assert_eq!(Datum::parse_decimal("100"), Some(Datum::Decimal(100, 0)));
        assert_eq!(Datum::parse_decimal(""), None);
        assert_eq!(Datum::parse_decimal("1.2.3"), None);
        assert_eq!(Datum::parse_decimal("+7"), Some(Datum::Decimal(7, 0)));
        assert_eq!(Datum::parse_decimal("12a"), None);
    }

    #[test]
    fn test_decimal_precision_bound() {
        let widest = "9".repeat(38);
        assert_eq!(
            Datum::parse_decimal(&widest),
            Some(Datum::Decimal(widest.parse().unwrap(), 0))
        );
        // Leading zeros are not significant.
        assert!(Datum::parse_decimal(&format!("000{widest}")).is_some());
        assert_eq!(Datum::parse_decimal(&"1".repeat(39)), None);
        assert_eq!(Datum::parse_decimal(&format!("0.{}1", "0".repeat(39))), None);
    }

    #[test]
    fn test_wide_decimal_text_is_out_of_range() {
        let wide = Datum::Text("1234567890123456789012345678901234567890".into());
        assert!(matches!(
            wide.convert(TargetType::Decimal),
            Err(CodecError::ValueOutOfRange { target: "decimal", .. })
        ));
        assert!(matches!(
            Datum::Text("twelve".into()).convert(TargetType::Decimal),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decimal_add_different_scales() {
        let a = Datum::Decimal(100, 1); // 10.0
        let b = Datum::Decimal(5, 2); // 0.05
        assert_eq!(a.add(&b), Some(Datum::Decimal(1005, 2))); // 10.05
    }

    #[test]
    fn test_decimal_add_int() {
        let a = Datum::Decimal(12345, 2); // 123.45
        assert_eq!(a.add(&Datum::Int64(10)), Some(Datum::Decimal(13345, 2)));
        assert_eq!(Datum::Int32(10).add(&a), Some(Datum::Decimal(13345, 2)));
    }

    #[test]
    fn test_decimal_add_overflow_is_none() {
        let max = Datum::Decimal(i128::MAX - 1, 0);
        assert_eq!(max.add(&Datum::Decimal(2, 0)), None);
        // Rescaling to the wider scale overflows before the addition does.
        assert_eq!(max.add(&Datum::Decimal(1, 2)), None);
        assert_eq!(
            Datum::Decimal(1, 2).add(&Datum::Int64(i64::MAX)),
            Some(Datum::Decimal(i128::from(i64::MAX) * 100 + 1, 2))
        );
        assert_eq!(Datum::Decimal(1, 38).add(&Datum::Int64(i64::MAX)), None);
        assert_eq!(decimal_normalize(1, 0, 1, 60), None);
    }

    #[test]
    fn test_decimal_div_rounds_half_up() {
        assert_eq!(decimal_div(100, 2, 3, 0, 4), Some(Datum::Decimal(3333, 4))); // 1.00 / 3
        assert_eq!(decimal_div(200, 2, 3, 0, 4), Some(Datum::Decimal(6667, 4))); // 2.00 / 3
        assert_eq!(decimal_div(-200, 2, 3, 0, 4), Some(Datum::Decimal(-6667, 4)));
        assert_eq!(decimal_div(3000, 2, 2, 0, 4), Some(Datum::Decimal(150000, 4))); // 30.00 / 2
        assert_eq!(decimal_div(100, 2, 0, 0, 4), None);
        assert_eq!(decimal_div(i128::MAX, 0, 1, 0, 0), None);
    }

    #[test]
    fn test_decimal_trim() {
        assert_eq!(decimal_trim(1000, 2), (10, 0));
        assert_eq!(decimal_trim(1050, 2), (105, 1));
        assert_eq!(decimal_trim(0, 5), (0, 0));
    }
}
