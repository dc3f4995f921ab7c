#![allow(clippy::float_cmp, clippy::cast_sign_loss)]

use serde_json::{Number, Value};

use crate::{compiler, error::CompileError, primitives::compare_numbers};

/// A keyword value that has to be a non-negative integer, such as `maxLength`.
///
/// Integral floats (`2.0`) are accepted.
pub(crate) fn non_negative_integer(
    ctx: &compiler::Context,
    keyword: &str,
    value: &Value,
) -> Result<u64, CompileError> {
    if let Some(number) = value.as_u64() {
        return Ok(number);
    }
    if let Some(number) = value.as_f64() {
        if number >= 0.0 && number.trunc() == number {
            // Saturates at `u64::MAX`
            #[allow(clippy::cast_possible_truncation)]
            return Ok(number as u64);
        }
    }
    Err(CompileError::invalid_keyword(
        ctx.location(),
        keyword,
        value,
        "expected a non-negative integer",
    ))
}

pub(crate) fn number<'a>(
    ctx: &compiler::Context,
    keyword: &str,
    value: &'a Value,
) -> Result<&'a Number, CompileError> {
    match value {
        Value::Number(number) => Ok(number),
        _ => Err(CompileError::invalid_keyword(
            ctx.location(),
            keyword,
            value,
            "expected a number",
        )),
    }
}

/// A list of unique strings, as in `required`.
pub(crate) fn string_list<'a>(
    ctx: &compiler::Context,
    keyword: &str,
    value: &'a Value,
) -> Result<Vec<&'a str>, CompileError> {
    let invalid = |reason: &'static str| {
        CompileError::invalid_keyword(ctx.location(), keyword, value, reason)
    };
    let Value::Array(items) = value else {
        return Err(invalid("expected an array of strings"));
    };
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let Some(name) = item.as_str() else {
            return Err(invalid("expected an array of strings"));
        };
        if names.contains(&name) {
            return Err(invalid("items must be unique"));
        }
        names.push(name);
    }
    Ok(names)
}

/// Fail if a lower limit is above the upper one.
pub(crate) fn check_range(
    ctx: &compiler::Context,
    lower: (&'static str, &Value),
    upper: (&'static str, &Value),
) -> Result<(), CompileError> {
    let inverted = match (lower.1, upper.1) {
        (Value::Number(low), Value::Number(high)) => {
            compare_numbers(low, high) == Some(std::cmp::Ordering::Greater)
        }
        _ => false,
    };
    if inverted {
        return Err(CompileError::InvalidRange {
            lower: lower.0,
            lower_value: lower.1.clone(),
            upper: upper.0,
            upper_value: upper.1.clone(),
            location: ctx.location().clone(),
        });
    }
    Ok(())
}
