//! Typed code templates.
//!
//! Every line of the validator listing is produced here. Placeholders are tagged, and each tag
//! accepts exactly one kind of argument:
//!
//! | placeholder | argument                                  |
//! |-------------|-------------------------------------------|
//! | `%d`        | [`Arg::Number`]                           |
//! | `%s`        | [`Arg::Code`], a [`SafeCode`] fragment    |
//! | `%j`        | [`Arg::Literal`], any JSON value          |
//! | `%r`        | [`Arg::Regex`], a compiled regex          |
//! | `%c`        | [`Arg::Compare`], a [`CompareOp`]         |
//!
//! Schema-provided strings can only appear through `%j`, which always serializes them as literals.
//! [`SafeCode`] can only be built inside this module, so arbitrary text can not be smuggled in
//! through `%s`.
use std::{cmp::Ordering, fmt};

use serde_json::Value;

use crate::regex::CompiledRegex;

/// Failure to instantiate a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown placeholder '%{0}'")]
    UnknownPlaceholder(char),
    #[error("Template ends with a dangling '%'")]
    DanglingPercent,
    #[error("Placeholder '%{placeholder}' expects {expected}, got {actual}")]
    Mismatch {
        placeholder: char,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Template expects more than {0} arguments")]
    TooFewArguments(usize),
    #[error("Template expects {expected} arguments, got {actual}")]
    TooManyArguments { expected: usize, actual: usize },
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("A single line can not contain a line break")]
    MultiLine,
}

/// A fragment of listing code produced by the compiler itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SafeCode(String);

impl SafeCode {
    /// A generated identifier such as `ref0` or `pattern3`.
    pub(crate) fn identifier(name: &str) -> Result<SafeCode, TemplateError> {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if valid {
            Ok(SafeCode(name.to_string()))
        } else {
            Err(TemplateError::InvalidIdentifier(name.to_string()))
        }
    }

    #[must_use]
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relational operators allowed in generated comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Whether `ordering` (left compared to right) satisfies the operator.
    ///
    /// Incomparable values (`None`) satisfy nothing.
    #[must_use]
    pub(crate) fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (_, None) => false,
            (CompareOp::Lt, Some(ord)) => ord == Ordering::Less,
            (CompareOp::Le, Some(ord)) => ord != Ordering::Greater,
            (CompareOp::Gt, Some(ord)) => ord == Ordering::Greater,
            (CompareOp::Ge, Some(ord)) => ord != Ordering::Less,
        }
    }
}

/// A template argument.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Arg<'a> {
    Number(f64),
    Code(&'a SafeCode),
    /// `None` renders as `undefined`.
    Literal(Option<&'a Value>),
    Regex(&'a CompiledRegex),
    Compare(CompareOp),
}

impl Arg<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Arg::Number(_) => "a number",
            Arg::Code(_) => "safe code",
            Arg::Literal(_) => "a literal",
            Arg::Regex(_) => "a regex",
            Arg::Compare(_) => "a compare operator",
        }
    }
}

/// Instantiate `template` with `args`.
///
/// # Errors
///
/// Fails on unknown placeholders, on an argument whose kind does not match its placeholder, and
/// when the number of arguments differs from the number of placeholders.
pub(crate) fn format(template: &str, args: &[Arg<'_>]) -> Result<SafeCode, TemplateError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut args_iter = args.iter();
    let mut used = 0;
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let placeholder = chars.next().ok_or(TemplateError::DanglingPercent)?;
        if placeholder == '%' {
            out.push('%');
            continue;
        }
        if !matches!(placeholder, 'd' | 's' | 'j' | 'r' | 'c') {
            return Err(TemplateError::UnknownPlaceholder(placeholder));
        }
        let arg = args_iter
            .next()
            .ok_or(TemplateError::TooFewArguments(used))?;
        used += 1;
        match (placeholder, arg) {
            ('d', Arg::Number(number)) => push_number(&mut out, *number),
            ('s', Arg::Code(code)) => out.push_str(code.as_str()),
            ('j', Arg::Literal(value)) => out.push_str(&literal(*value)),
            ('r', Arg::Regex(regex)) => {
                out.push_str("new RegExp(");
                out.push_str(&literal(Some(&Value::String(regex.source().to_string()))));
                out.push_str(", \"u\")");
            }
            ('c', Arg::Compare(op)) => out.push_str(op.as_str()),
            (placeholder, arg) => {
                return Err(TemplateError::Mismatch {
                    placeholder,
                    expected: match placeholder {
                        'd' => "a number",
                        's' => "safe code",
                        'j' => "a literal",
                        'r' => "a regex",
                        _ => "a compare operator",
                    },
                    actual: arg.kind(),
                })
            }
        }
    }
    if used != args.len() {
        return Err(TemplateError::TooManyArguments {
            expected: used,
            actual: args.len(),
        });
    }
    Ok(SafeCode(out))
}

fn push_number(out: &mut String, number: f64) {
    if number.is_nan() {
        out.push_str("NaN");
    } else if number.is_infinite() {
        out.push_str(if number > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        out.push_str(&number.to_string());
    }
}

/// Serialize a value as a listing literal.
///
/// U+2028 and U+2029 are valid in JSON strings but terminate lines in the listing, so they are
/// always escaped.
pub(crate) fn literal(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "undefined".to_string();
    };
    let serialized = value.to_string();
    if serialized.contains(&['\u{2028}', '\u{2029}'][..]) {
        serialized
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029")
    } else {
        serialized
    }
}
