//! Error types.
//!
//! Two kinds of failures never mix: [`CompileError`] means the schema itself is unusable and no
//! validator exists, [`ValidationError`] means a value does not satisfy a compiled validator.
use std::{borrow::Cow, fmt, iter::empty};

use serde::{ser::SerializeStruct, Serialize, Serializer};
use serde_json::Value;

use crate::{paths::Location, template::TemplateError, types::JsonTypeSet};

/// An error that occurred while compiling a schema.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    /// A schema node is not an object or a boolean.
    #[error("Invalid schema at '{location}': expected {expected}, got {value}")]
    InvalidSchema {
        location: Location,
        expected: &'static str,
        value: Value,
    },
    /// A keyword has a value of the wrong shape.
    #[error("Invalid value for '{keyword}' at '{location}': {value} ({reason})")]
    InvalidKeyword {
        keyword: String,
        value: Value,
        location: Location,
        reason: Cow<'static, str>,
    },
    /// A keyword that is not part of the dialect.
    #[error("Unknown keyword '{keyword}' at '{location}'")]
    UnknownKeyword { keyword: String, location: Location },
    /// A known keyword that no rule consumed, e.g. `then` without `if`.
    #[error("Unprocessed keyword '{keyword}' at '{location}': {reason}")]
    UnprocessedKeyword {
        keyword: String,
        location: Location,
        reason: &'static str,
    },
    /// A keyword that can never apply because of the declared `type`.
    #[error("Keyword '{keyword}' can not apply to {types} at '{location}'")]
    TypeMismatch {
        keyword: String,
        types: String,
        location: Location,
    },
    /// Lower bound above the upper bound.
    #[error("Invalid range at '{location}': '{lower}' ({lower_value}) is greater than '{upper}' ({upper_value})")]
    InvalidRange {
        lower: &'static str,
        lower_value: Value,
        upper: &'static str,
        upper_value: Value,
        location: Location,
    },
    /// `$ref` target not found.
    #[error("Unresolvable reference '{reference}' at '{location}'")]
    UnresolvableReference { reference: String, location: Location },
    /// Reference resolution failed for structural reasons.
    #[error("Invalid reference at '{location}': {source}")]
    Reference {
        location: Location,
        #[source]
        source: jsonsafe_referencing::Error,
    },
    /// References that lead back to themselves without validating a member of the instance.
    #[error("Reference at '{location}' leads back to itself without descending into the instance")]
    CyclicReference { location: Location },
    /// A rule of the strict mode is not met.
    #[error("Strict mode violation at '{location}': {message}")]
    Strict { location: Location, message: String },
    /// A regex that does not compile.
    #[error("Invalid regex {pattern:?} at '{location}': {message}")]
    InvalidRegex {
        pattern: String,
        location: Location,
        message: String,
    },
    /// A `format` that is not in the format table.
    #[error("Unknown format {format:?} at '{location}'")]
    UnknownFormat { format: String, location: Location },
    /// Options that can not be honored for this schema.
    #[error("Unsupported option at '{location}': {message}")]
    UnsupportedOption {
        location: Location,
        message: &'static str,
    },
    /// The listing could not be rendered; a bug in the compiler.
    #[error("Internal error: {0}")]
    Template(#[from] TemplateError),
    /// The compiler reached a state it should never be in.
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl CompileError {
    pub(crate) fn invalid_schema(
        location: Location,
        expected: &'static str,
        value: &Value,
    ) -> Self {
        CompileError::InvalidSchema {
            location,
            expected,
            value: value.clone(),
        }
    }

    pub(crate) fn invalid_keyword(
        location: &Location,
        keyword: &str,
        value: &Value,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        CompileError::InvalidKeyword {
            keyword: keyword.to_string(),
            value: value.clone(),
            location: location.join(keyword),
            reason: reason.into(),
        }
    }

    pub(crate) fn strict(location: &Location, message: impl Into<String>) -> Self {
        CompileError::Strict {
            location: location.clone(),
            message: message.into(),
        }
    }

    /// Schema location of the offending keyword.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::InvalidSchema { location, .. }
            | CompileError::InvalidKeyword { location, .. }
            | CompileError::UnknownKeyword { location, .. }
            | CompileError::UnprocessedKeyword { location, .. }
            | CompileError::TypeMismatch { location, .. }
            | CompileError::InvalidRange { location, .. }
            | CompileError::UnresolvableReference { location, .. }
            | CompileError::Reference { location, .. }
            | CompileError::CyclicReference { location }
            | CompileError::Strict { location, .. }
            | CompileError::InvalidRegex { location, .. }
            | CompileError::UnknownFormat { location, .. }
            | CompileError::UnsupportedOption { location, .. } => Some(location),
            CompileError::Template(_) | CompileError::Internal(_) => None,
        }
    }
}

/// An error that occurred during validation.
#[derive(Debug, Clone)]
pub struct ValidationError<'a> {
    /// Value of the property that failed validation.
    pub instance: Cow<'a, Value>,
    /// Type of validation error.
    pub kind: ValidationErrorKind,
    /// Path to the value that failed validation.
    pub instance_location: Location,
    /// Path to the keyword that failed validation.
    pub keyword_location: Location,
}

/// An iterator over instances of [`ValidationError`] that represent validation error for the
/// input instance.
pub(crate) type ErrorIterator<'a> =
    Box<dyn Iterator<Item = ValidationError<'a>> + Sync + Send + 'a>;

pub(crate) fn no_error<'a>() -> ErrorIterator<'a> {
    Box::new(empty())
}

pub(crate) fn error(instance: ValidationError) -> ErrorIterator {
    Box::new(std::iter::once(instance))
}

/// Kinds of errors that may happen during validation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationErrorKind {
    /// The input array contains more items than expected.
    AdditionalItems { limit: usize },
    /// Unexpected properties.
    AdditionalProperties { unexpected: Vec<String> },
    /// The input value is not valid under any of the schemas listed in the 'anyOf' keyword.
    AnyOf,
    /// Regex matching ran out of its backtracking budget.
    BacktrackLimit { message: String },
    /// The input value doesn't match the expected constant.
    Constant { expected_value: Value },
    /// The input array doesn't contain items conforming to the specified schema.
    Contains,
    /// Too few items match `contains`.
    MinContains { limit: u64 },
    /// Too many items match `contains`.
    MaxContains { limit: u64 },
    /// The input value does not respect the defined contentEncoding.
    ContentEncoding { content_encoding: String },
    /// The input value does not respect the defined contentMediaType.
    ContentMediaType { content_media_type: String },
    /// The input value doesn't match any of the specified options.
    Enum { options: Value },
    /// Value is too large.
    ExclusiveMaximum { limit: Value },
    /// Value is too small.
    ExclusiveMinimum { limit: Value },
    /// Everything is invalid for `false` schema.
    FalseSchema,
    /// The input doesn't match the specified format.
    Format { format: String },
    /// Too many items in an array.
    MaxItems { limit: u64 },
    /// Value is too large.
    Maximum { limit: Value },
    /// String is too long.
    MaxLength { limit: u64 },
    /// Too many properties in an object.
    MaxProperties { limit: u64 },
    /// Too few items in an array.
    MinItems { limit: u64 },
    /// Value is too small.
    Minimum { limit: Value },
    /// String is too short.
    MinLength { limit: u64 },
    /// Not enough properties in an object.
    MinProperties { limit: u64 },
    /// When some number is not a multiple of another number.
    MultipleOf { multiple_of: Value },
    /// Negated schema failed validation.
    Not { schema: Value },
    /// The given schema is valid under more than one of the schemas listed in the 'oneOf' keyword.
    OneOfMultipleValid,
    /// The given schema is not valid under any of the schemas listed in the 'oneOf' keyword.
    OneOfNotValid,
    /// When the input doesn't match to a pattern.
    Pattern { pattern: String },
    /// Object property names are invalid.
    PropertyNames { property: String },
    /// When a required property is missing.
    Required { property: String },
    /// When the input value doesn't match one or multiple required types.
    Type { types: JsonTypeSet },
    /// Unexpected items.
    UnevaluatedItems { unexpected: Vec<String> },
    /// Unexpected properties.
    UnevaluatedProperties { unexpected: Vec<String> },
    /// When the input array has non-unique elements.
    UniqueItems,
}

impl<'a> ValidationError<'a> {
    pub(crate) fn new(
        keyword_location: Location,
        instance_location: Location,
        instance: &'a Value,
        kind: ValidationErrorKind,
    ) -> ValidationError<'a> {
        ValidationError {
            instance: Cow::Borrowed(instance),
            kind,
            instance_location,
            keyword_location,
        }
    }

    /// Detach the error from the validated instance.
    #[must_use]
    pub fn to_owned(self) -> ValidationError<'static> {
        ValidationError {
            instance: Cow::Owned(self.instance.into_owned()),
            kind: self.kind,
            instance_location: self.instance_location,
            keyword_location: self.keyword_location,
        }
    }
}

fn write_quoted_list(f: &mut fmt::Formatter<'_>, list: &[String]) -> fmt::Result {
    let mut iter = list.iter();
    if let Some(item) = iter.next() {
        write!(f, "'{item}'")?;
    }
    for item in iter {
        write!(f, ", '{item}'")?;
    }
    Ok(())
}

fn write_unexpected_suffix(f: &mut fmt::Formatter<'_>, len: usize) -> fmt::Result {
    f.write_str(if len == 1 { " was unexpected)" } else { " were unexpected)" })
}

impl fmt::Display for ValidationError<'_> {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = &self.instance;
        match &self.kind {
            ValidationErrorKind::AdditionalItems { limit } => {
                f.write_str("Additional items are not allowed (")?;
                if let Value::Array(items) = instance.as_ref() {
                    let mut iter = items.iter().skip(*limit);
                    if let Some(item) = iter.next() {
                        write!(f, "{item}")?;
                    }
                    for item in iter {
                        write!(f, ", {item}")?;
                    }
                    write_unexpected_suffix(f, items.len().saturating_sub(*limit))
                } else {
                    f.write_str(")")
                }
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                f.write_str("Additional properties are not allowed (")?;
                write_quoted_list(f, unexpected)?;
                write_unexpected_suffix(f, unexpected.len())
            }
            ValidationErrorKind::AnyOf => write!(
                f,
                "{instance} is not valid under any of the schemas listed in the 'anyOf' keyword"
            ),
            ValidationErrorKind::BacktrackLimit { message } => f.write_str(message),
            ValidationErrorKind::Constant { expected_value } => {
                write!(f, "{expected_value} was expected")
            }
            ValidationErrorKind::Contains => write!(
                f,
                "None of {instance} are valid under the given schema"
            ),
            ValidationErrorKind::MinContains { limit } => write!(
                f,
                "{instance} has less than {limit} item{} valid under the given schema",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::MaxContains { limit } => write!(
                f,
                "{instance} has more than {limit} item{} valid under the given schema",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::ContentEncoding { content_encoding } => write!(
                f,
                "{instance} is not compliant with {content_encoding:?} content encoding"
            ),
            ValidationErrorKind::ContentMediaType { content_media_type } => write!(
                f,
                "{instance} is not compliant with {content_media_type:?} media type"
            ),
            ValidationErrorKind::Enum { options } => {
                write!(f, "{instance} is not one of {options}")
            }
            ValidationErrorKind::ExclusiveMaximum { limit } => write!(
                f,
                "{instance} is greater than or equal to the maximum of {limit}"
            ),
            ValidationErrorKind::ExclusiveMinimum { limit } => write!(
                f,
                "{instance} is less than or equal to the minimum of {limit}"
            ),
            ValidationErrorKind::FalseSchema => write!(f, "False schema does not allow {instance}"),
            ValidationErrorKind::Format { format } => write!(f, "{instance} is not a {format:?}"),
            ValidationErrorKind::MaxItems { limit } => write!(
                f,
                "{instance} has more than {limit} item{}",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::Maximum { limit } => {
                write!(f, "{instance} is greater than the maximum of {limit}")
            }
            ValidationErrorKind::MaxLength { limit } => write!(
                f,
                "{instance} is longer than {limit} character{}",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::MaxProperties { limit } => write!(
                f,
                "{instance} has more than {limit} propert{}",
                if *limit == 1 { "y" } else { "ies" }
            ),
            ValidationErrorKind::MinItems { limit } => write!(
                f,
                "{instance} has less than {limit} item{}",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::Minimum { limit } => {
                write!(f, "{instance} is less than the minimum of {limit}")
            }
            ValidationErrorKind::MinLength { limit } => write!(
                f,
                "{instance} is shorter than {limit} character{}",
                if *limit == 1 { "" } else { "s" }
            ),
            ValidationErrorKind::MinProperties { limit } => write!(
                f,
                "{instance} has less than {limit} propert{}",
                if *limit == 1 { "y" } else { "ies" }
            ),
            ValidationErrorKind::MultipleOf { multiple_of } => {
                write!(f, "{instance} is not a multiple of {multiple_of}")
            }
            ValidationErrorKind::Not { schema } => {
                write!(f, "{schema} is not allowed for {instance}")
            }
            ValidationErrorKind::OneOfMultipleValid => write!(
                f,
                "{instance} is valid under more than one of the schemas listed in the 'oneOf' keyword"
            ),
            ValidationErrorKind::OneOfNotValid => write!(
                f,
                "{instance} is not valid under any of the schemas listed in the 'oneOf' keyword"
            ),
            ValidationErrorKind::Pattern { pattern } => {
                write!(f, "{instance} does not match {pattern:?}")
            }
            ValidationErrorKind::PropertyNames { property } => {
                write!(f, "Property name {property:?} is not valid under the given schema")
            }
            ValidationErrorKind::Required { property } => {
                write!(f, "{property:?} is a required property")
            }
            ValidationErrorKind::Type { types } => {
                if types.len() == 1 {
                    write!(f, "{instance} is not of type {types}")
                } else {
                    write!(f, "{instance} is not of types {types}")
                }
            }
            ValidationErrorKind::UnevaluatedItems { unexpected } => {
                f.write_str("Unevaluated items are not allowed (")?;
                write_quoted_list(f, unexpected)?;
                write_unexpected_suffix(f, unexpected.len())
            }
            ValidationErrorKind::UnevaluatedProperties { unexpected } => {
                f.write_str("Unevaluated properties are not allowed (")?;
                write_quoted_list(f, unexpected)?;
                write_unexpected_suffix(f, unexpected.len())
            }
            ValidationErrorKind::UniqueItems => write!(f, "{instance} has non-unique elements"),
        }
    }
}

impl std::error::Error for ValidationError<'_> {}

impl Serialize for ValidationError<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationError", 3)?;
        state.serialize_field("keywordLocation", &self.keyword_location)?;
        state.serialize_field("instanceLocation", &self.instance_location)?;
        state.serialize_field("error", &self.to_string())?;
        state.end()
    }
}

/// Result of a single validation call.
#[derive(Debug, Clone)]
pub struct ValidationOutput<'a> {
    /// Whether the instance is valid.
    pub valid: bool,
    /// Errors found, empty when the instance is valid or error details are disabled.
    pub errors: Vec<ValidationError<'a>>,
}

impl ValidationOutput<'_> {
    pub(crate) fn valid() -> Self {
        ValidationOutput {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Detach the output from the validated instance.
    #[must_use]
    pub fn to_owned(self) -> ValidationOutput<'static> {
        ValidationOutput {
            valid: self.valid,
            errors: self.errors.into_iter().map(ValidationError::to_owned).collect(),
        }
    }
}

impl Serialize for ValidationOutput<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationOutput", 2)?;
        state.serialize_field("valid", &self.valid)?;
        state.serialize_field("errors", &self.errors)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::{ValidationError, ValidationErrorKind};
    use crate::{
        paths::Location,
        types::{JsonType, JsonTypeSet},
    };

    fn render(instance: &serde_json::Value, kind: ValidationErrorKind) -> String {
        ValidationError::new(Location::new(), Location::new(), instance, kind).to_string()
    }

    #[test_case(&json!("a"), ValidationErrorKind::Type { types: JsonTypeSet::empty().insert(JsonType::Integer) }, r#""a" is not of type "integer""#)]
    #[test_case(&json!(1), ValidationErrorKind::Type { types: JsonTypeSet::empty().insert(JsonType::Null).insert(JsonType::String) }, r#"1 is not of types "null", "string""#)]
    #[test_case(&json!({}), ValidationErrorKind::Required { property: "name".into() }, r#""name" is a required property"#)]
    #[test_case(&json!("abc"), ValidationErrorKind::MaxLength { limit: 1 }, r#""abc" is longer than 1 character"#)]
    #[test_case(&json!([1, 2, 3]), ValidationErrorKind::AdditionalItems { limit: 1 }, "Additional items are not allowed (2, 3 were unexpected)")]
    #[test_case(&json!({"a": 1}), ValidationErrorKind::AdditionalProperties { unexpected: vec!["a".into()] }, "Additional properties are not allowed ('a' was unexpected)")]
    #[test_case(&json!(5), ValidationErrorKind::ExclusiveMaximum { limit: json!(5) }, "5 is greater than or equal to the maximum of 5")]
    fn test_messages(instance: &serde_json::Value, kind: ValidationErrorKind, expected: &str) {
        assert_eq!(render(instance, kind), expected);
    }

    #[test]
    fn test_serialize() {
        let instance = json!(1);
        let error = ValidationError::new(
            Location::new().join("minimum"),
            Location::new().join(0),
            &instance,
            ValidationErrorKind::Minimum { limit: json!(2) },
        );
        assert_eq!(
            serde_json::to_value(&error).expect("Serializable"),
            json!({
                "keywordLocation": "/minimum",
                "instanceLocation": "/0",
                "error": "1 is less than the minimum of 2"
            })
        );
    }
}
