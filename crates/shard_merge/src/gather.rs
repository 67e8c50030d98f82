//! Row keying, ordering and summation shared by the distinct and aggregation merges.

use std::cmp::Ordering;

use chrono::{Datelike, Timelike};

use shard_common::datum::{decimal_normalize, decimal_trim, Datum};
use shard_common::error::CodecError;

/// One column of a distinct key. `offset` is 0-based into the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyColumn {
    pub offset: usize,
    pub case_insensitive: bool,
}

/// Deterministic binary key over `columns` of `values`.
///
/// Equal keys mean equal distinct tuples: NULLs match each other, integer widths match
/// each other, decimals match regardless of trailing zeros, and text in a
/// case-insensitive column is folded to lowercase.
pub(crate) fn encode_distinct_key(columns: &[KeyColumn], values: &[Datum]) -> Vec<u8> {
    let mut key = Vec::with_capacity(columns.len() * 9);
    for column in columns {
        let datum = values.get(column.offset).unwrap_or(&Datum::Null);
        match datum {
            Datum::Null => key.push(0),
            Datum::Boolean(b) => {
                key.push(1);
                key.push(u8::from(*b));
            }
            Datum::Int8(_) | Datum::Int16(_) | Datum::Int32(_) | Datum::Int64(_) => {
                let v = datum.as_i64().unwrap_or_default();
                push_int(&mut key, v);
            }
            Datum::Float32(_) | Datum::Float64(_) => {
                let v = datum.as_f64().unwrap_or_default();
                // -0.0 and 0.0 are one value.
                let v = if v == 0.0 { 0.0 } else { v };
                key.push(4);
                key.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Datum::Text(s) => {
                if column.case_insensitive {
                    push_len_prefixed(&mut key, 5, s.to_lowercase().as_bytes());
                } else {
                    push_len_prefixed(&mut key, 5, s.as_bytes());
                }
            }
            Datum::Timestamp(ts) => {
                key.push(6);
                key.extend_from_slice(&ts.date().num_days_from_ce().to_be_bytes());
                key.extend_from_slice(&ts.time().num_seconds_from_midnight().to_be_bytes());
                key.extend_from_slice(&ts.time().nanosecond().to_be_bytes());
            }
            Datum::Date(d) => {
                key.push(9);
                key.extend_from_slice(&d.num_days_from_ce().to_be_bytes());
            }
            Datum::Decimal(m, s) => {
                let (m, s) = decimal_trim(*m, *s);
                match (s, i64::try_from(m)) {
                    (0, Ok(v)) => push_int(&mut key, v),
                    _ => {
                        key.push(10);
                        key.push(s);
                        key.extend_from_slice(&m.to_be_bytes());
                    }
                }
            }
            Datum::Time(t) => {
                key.push(11);
                key.extend_from_slice(&t.num_seconds_from_midnight().to_be_bytes());
                key.extend_from_slice(&t.nanosecond().to_be_bytes());
            }
            Datum::Bytes(bytes) => push_len_prefixed(&mut key, 14, bytes),
            Datum::Lob(lob) => push_len_prefixed(&mut key, 15, lob.as_bytes()),
            Datum::Other(raw) => push_len_prefixed(&mut key, 16, raw.to_string().as_bytes()),
        }
    }
    key
}

fn push_int(key: &mut Vec<u8>, v: i64) {
    key.push(2);
    key.extend_from_slice(&v.to_be_bytes());
}

fn push_len_prefixed(key: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    key.push(tag);
    key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(bytes);
}

/// Total order used by MAX/MIN. NULL sorts first; incomparable types compare equal.
pub(crate) fn cmp_datum(a: &Datum, b: &Datum) -> Ordering {
    match (a, b) {
        (Datum::Null, Datum::Null) => Ordering::Equal,
        (Datum::Null, _) => Ordering::Less,
        (_, Datum::Null) => Ordering::Greater,
        (Datum::Decimal(x, sx), Datum::Decimal(y, sy)) => {
            match decimal_normalize(*x, *sx, *y, *sy) {
                Some((x, y)) => x.cmp(&y),
                None => cmp_decimal_parts(*x, *sx, *y, *sy),
            }
        }
        (Datum::Text(x), Datum::Text(y)) => x.cmp(y),
        (Datum::Boolean(x), Datum::Boolean(y)) => x.cmp(y),
        (Datum::Timestamp(x), Datum::Timestamp(y)) => x.cmp(y),
        (Datum::Date(x), Datum::Date(y)) => x.cmp(y),
        (Datum::Time(x), Datum::Time(y)) => x.cmp(y),
        (Datum::Bytes(x), Datum::Bytes(y)) => x.cmp(y),
        (Datum::Lob(x), Datum::Lob(y)) => x.as_bytes().cmp(y.as_bytes()),
        _ => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                return x.cmp(&y);
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
    }
}

/// Compare decimals whose common scale does not fit an i128: exactly on the whole parts,
/// then approximately on the fractions.
fn cmp_decimal_parts(x: i128, sx: u8, y: i128, sy: u8) -> Ordering {
    let split = |m: i128, s: u8| match 10i128.checked_pow(u32::from(s)) {
        Some(p) => (m / p, m % p),
        None => (0, m),
    };
    let ((xw, xf), (yw, yf)) = (split(x, sx), split(y, sy));
    if xw != yw {
        return xw.cmp(&yw);
    }
    let xf = xf as f64 / 10f64.powi(i32::from(sx));
    let yf = yf as f64 / 10f64.powi(i32::from(sy));
    xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
}

/// Add `value` to a running SUM. Integer overflow widens to a scale-0 decimal; decimal
/// overflow is a range error.
pub(crate) fn sum_datums(acc: &Datum, value: &Datum) -> Result<Datum, CodecError> {
    if let Some(sum) = acc.add(value) {
        return Ok(sum);
    }
    match (acc, value) {
        (Datum::Decimal(..), other) | (other, Datum::Decimal(..)) if other.is_numeric() => {
            return Err(CodecError::ValueOutOfRange {
                value: format!("{acc} + {value}"),
                target: "decimal",
            });
        }
        _ => {}
    }
    match (acc.as_i64(), value.as_i64()) {
        (Some(a), Some(b)) => Ok(Datum::Decimal(i128::from(a) + i128::from(b), 0)),
        _ => Err(CodecError::TypeMismatch {
            expected: "numeric".to_string(),
            got: if acc.is_numeric() {
                value.type_name().to_string()
            } else {
                acc.type_name().to_string()
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(offset: usize) -> KeyColumn {
        KeyColumn {
            offset,
            case_insensitive: false,
        }
    }

    #[test]
    fn test_key_unifies_integer_widths_and_decimals() {
        let a = encode_distinct_key(&[col(0)], &[Datum::Int32(10)]);
        let b = encode_distinct_key(&[col(0)], &[Datum::Int64(10)]);
        let c = encode_distinct_key(&[col(0)], &[Datum::Decimal(1000, 2)]);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(
            encode_distinct_key(&[col(0)], &[Datum::Decimal(150, 2)]),
            encode_distinct_key(&[col(0)], &[Datum::Decimal(15, 1)])
        );
    }

    #[test]
    fn test_key_nulls_are_equal() {
        let a = encode_distinct_key(&[col(0), col(1)], &[Datum::Null, Datum::Int32(1)]);
        let b = encode_distinct_key(&[col(0), col(1)], &[Datum::Null, Datum::Int32(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_text_case_folding() {
        let folded = KeyColumn {
            offset: 0,
            case_insensitive: true,
        };
        let upper = [Datum::Text("PAID".into())];
        let lower = [Datum::Text("paid".into())];
        assert_eq!(
            encode_distinct_key(&[folded], &upper),
            encode_distinct_key(&[folded], &lower)
        );
        assert_ne!(
            encode_distinct_key(&[col(0)], &upper),
            encode_distinct_key(&[col(0)], &lower)
        );
    }

    #[test]
    fn test_key_is_prefix_free_for_text() {
        let a = encode_distinct_key(
            &[col(0), col(1)],
            &[Datum::Text("ab".into()), Datum::Text("c".into())],
        );
        let b = encode_distinct_key(
            &[col(0), col(1)],
            &[Datum::Text("a".into()), Datum::Text("bc".into())],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_cmp_datum() {
        assert_eq!(cmp_datum(&Datum::Int32(3), &Datum::Int64(5)), Ordering::Less);
        assert_eq!(
            cmp_datum(&Datum::Decimal(150, 2), &Datum::Decimal(2, 0)),
            Ordering::Less
        );
        assert_eq!(cmp_datum(&Datum::Float64(2.5), &Datum::Int32(2)), Ordering::Greater);
        assert_eq!(cmp_datum(&Datum::Null, &Datum::Int32(2)), Ordering::Less);
    }

    #[test]
    fn test_sum_widens_on_overflow() {
        assert_eq!(
            sum_datums(&Datum::Int64(i64::MAX), &Datum::Int64(1)),
            Ok(Datum::Decimal(i128::from(i64::MAX) + 1, 0))
        );
        assert!(sum_datums(&Datum::Text("x".into()), &Datum::Int64(1)).is_err());
    }

    #[test]
    fn test_decimal_sum_overflow_is_range_error() {
        let widest: i128 = "9".repeat(38).parse().unwrap();
        let err =
            sum_datums(&Datum::Decimal(widest, 0), &Datum::Decimal(widest - 1, 0)).unwrap_err();
        assert!(matches!(err, CodecError::ValueOutOfRange { target: "decimal", .. }));
        assert!(matches!(
            sum_datums(&Datum::Int64(1), &Datum::Decimal(i128::MAX, 0)),
            Err(CodecError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_cmp_decimal_beyond_common_scale() {
        // 10^30 at scale 0 against 1 at scale 38 cannot share a scale.
        let big = Datum::Decimal(10i128.pow(30), 0);
        let tiny = Datum::Decimal(1, 38);
        assert_eq!(cmp_datum(&big, &tiny), Ordering::Greater);
        assert_eq!(cmp_datum(&tiny, &big), Ordering::Less);
        assert_eq!(
            cmp_datum(&Datum::Decimal(-(10i128.pow(30)), 0), &tiny),
            Ordering::Less
        );
    }
}
