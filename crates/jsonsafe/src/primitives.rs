//! Runtime helpers shared by validators.
//!
//! The compiler registers a [`Primitive`] in the scope whenever it builds a validator that calls
//! one of these, so the listing imports only what is used.
use std::str::FromStr;

use ahash::AHashSet;
use fraction::{BigFraction, BigUint};
use num_cmp::NumCmp;
use serde_json::{Map, Number, Value};

use crate::template::{SafeCode, TemplateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Primitive {
    DeepEqual,
    IsMultipleOf,
    HasDuplicates,
    StringLength,
    DecodeBase64,
}

impl Primitive {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Primitive::DeepEqual => "deepEqual",
            Primitive::IsMultipleOf => "isMultipleOf",
            Primitive::HasDuplicates => "hasDuplicates",
            Primitive::StringLength => "stringLength",
            Primitive::DecodeBase64 => "decodeBase64",
        }
    }

    pub(crate) fn code(self) -> Result<SafeCode, TemplateError> {
        SafeCode::identifier(self.name())
    }
}

macro_rules! num_cmp {
    ($method:ident, $left:expr, $right:expr) => {
        if let Some(b) = $right.as_u64() {
            NumCmp::$method($left, b)
        } else if let Some(b) = $right.as_i64() {
            NumCmp::$method($left, b)
        } else {
            NumCmp::$method($left, $right.as_f64().unwrap_or(f64::NAN))
        }
    };
}

/// Numeric equality across integer and float representations, so `1 == 1.0`.
pub(crate) fn equal_numbers(left: &Number, right: &Number) -> bool {
    if let Some(a) = left.as_u64() {
        num_cmp!(num_eq, a, right)
    } else if let Some(a) = left.as_i64() {
        num_cmp!(num_eq, a, right)
    } else {
        let a = left.as_f64().unwrap_or(f64::NAN);
        num_cmp!(num_eq, a, right)
    }
}

/// Order two numbers without losing precision on large integers.
pub(crate) fn compare_numbers(left: &Number, right: &Number) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering;
    let ordering = |lt: bool, gt: bool| {
        if lt {
            Ordering::Less
        } else if gt {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    };
    if left.as_f64().is_some_and(f64::is_nan) || right.as_f64().is_some_and(f64::is_nan) {
        return None;
    }
    let result = if let Some(a) = left.as_u64() {
        ordering(num_cmp!(num_lt, a, right), num_cmp!(num_gt, a, right))
    } else if let Some(a) = left.as_i64() {
        ordering(num_cmp!(num_lt, a, right), num_cmp!(num_gt, a, right))
    } else {
        let a = left.as_f64()?;
        ordering(num_cmp!(num_lt, a, right), num_cmp!(num_gt, a, right))
    };
    Some(result)
}

fn equal_objects(left: &Map<String, Value>, right: &Map<String, Value>) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(key, value)| right.get(key).is_some_and(|other| deep_equal(value, other)))
}

/// Structural equality with JSON semantics.
pub(crate) fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => equal_numbers(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => equal_objects(a, b),
        (_, _) => false,
    }
}

/// Exact decimal value of a finite float, as printed by its shortest round-trip representation.
fn decimal_fraction(value: f64) -> Option<BigFraction> {
    let text = value.abs().to_string();
    let (integer, fractional) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let numerator = BigUint::from_str(&format!("{integer}{fractional}")).ok()?;
    let exponent = u32::try_from(fractional.len()).ok()?;
    let denominator = BigUint::from(10_u8).pow(exponent);
    Some(BigFraction::new(numerator, denominator))
}

/// Whether `value` is an integer multiple of `divisor`. `divisor` is positive.
#[allow(clippy::float_cmp)]
pub(crate) fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    if let (Some(value), Some(divisor)) = (value.as_u64(), divisor.as_u64()) {
        return divisor != 0 && value % divisor == 0;
    }
    if let (Some(value), Some(divisor)) = (value.as_i64(), divisor.as_i64()) {
        return value.checked_rem(divisor) == Some(0);
    }
    let (Some(value), Some(divisor)) = (value.as_f64(), divisor.as_f64()) else {
        return false;
    };
    if divisor == 0.0 || !value.is_finite() || !divisor.is_finite() {
        return false;
    }
    if value.fract() == 0.0 && divisor.fract() == 0.0 {
        return value % divisor == 0.0;
    }
    let (Some(value), Some(divisor)) = (decimal_fraction(value), decimal_fraction(divisor)) else {
        return false;
    };
    let quotient = value / divisor;
    quotient
        .denom()
        .is_none_or(|denominator| *denominator == BigUint::from(1_u8))
}

/// A canonical string for hashing, equal for values that are [`deep_equal`].
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push('n'),
        Value::Bool(true) => out.push('t'),
        Value::Bool(false) => out.push('f'),
        Value::Number(number) => {
            out.push('#');
            if let Some(n) = number.as_u64() {
                out.push_str(itoa::Buffer::new().format(n));
            } else if let Some(n) = number.as_i64() {
                out.push_str(itoa::Buffer::new().format(n));
            } else if let Some(n) = number.as_f64() {
                if n.fract() == 0.0 && n.abs() < 9.0e18 {
                    out.push_str(itoa::Buffer::new().format(n as i64));
                } else {
                    out.push_str(&n.to_string());
                }
            }
        }
        Value::String(string) => {
            out.push('"');
            out.push_str(&string.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                canonical(item, out);
                out.push(',');
            }
            out.push(']');
        }
        Value::Object(object) => {
            let mut keys: Vec<_> = object.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for key in keys {
                canonical(&Value::String(key.clone()), out);
                out.push(':');
                if let Some(item) = object.get(key) {
                    canonical(item, out);
                }
                out.push(',');
            }
            out.push('}');
        }
    }
}

const PAIRWISE_LIMIT: usize = 15;

/// Whether any two items are [`deep_equal`].
pub(crate) fn has_duplicates(items: &[Value]) -> bool {
    if items.len() < 2 {
        return false;
    }
    if items.len() <= PAIRWISE_LIMIT {
        return items
            .iter()
            .enumerate()
            .any(|(idx, item)| items[idx + 1..].iter().any(|other| deep_equal(item, other)));
    }
    let mut seen = AHashSet::with_capacity(items.len());
    let mut buffer = String::new();
    for item in items {
        buffer.clear();
        canonical(item, &mut buffer);
        if !seen.insert(buffer.clone()) {
            return true;
        }
    }
    false
}

/// Length in Unicode code points.
pub(crate) fn string_length(value: &str) -> u64 {
    bytecount::num_chars(value.as_bytes()) as u64
}

pub(crate) fn decode_base64(value: &str) -> Option<Vec<u8>> {
    data_encoding::BASE64.decode(value.as_bytes()).ok()
}
