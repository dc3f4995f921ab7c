//! A JSON Schema compiler that refuses to guess.
//!
//! `jsonsafe` compiles a schema into a reusable [`Validator`]. Along the way it checks the schema
//! itself: unknown keywords, keywords that can never apply to the declared `type`, inverted
//! ranges and unresolvable references are compile errors rather than silently ignored. Three
//! [`Mode`]s control how strict these checks are.
//!
//! Supported dialects are Draft 4, 6, 7, 2019-09 and 2020-12. The dialect is taken from
//! `$schema`, falling back to [`ValidationOptions::with_default_schema_version`].
//!
//! # Validation
//!
//! ```rust
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string", "maxLength": 8}},
//!     "required": ["name"]
//! });
//! let validator = jsonsafe::validator_for(&schema).expect("Valid schema");
//!
//! assert!(validator.is_valid(&json!({"name": "Ferris"})));
//!
//! let instance = json!({"name": "Ferris the crab"});
//! let output = validator.validate(&instance);
//! assert!(!output.valid);
//! assert_eq!(output.errors[0].keyword_location.as_str(), "/properties/name/maxLength");
//! assert_eq!(output.errors[0].instance_location.as_str(), "/name");
//! ```
//!
//! # Modes
//!
//! - [`Mode::Permissive`] ignores unknown keywords and unknown formats.
//! - [`Mode::Standard`] rejects them, along with keywords that have no effect.
//! - [`Mode::Strict`] additionally requires `$schema`, anchored regexes and fully constrained
//!   string, object and array schemas.
//!
//! ```rust
//! use jsonsafe::{CompileError, Mode};
//! use serde_json::json;
//!
//! let schema = json!({"type": "string", "minimum": 1});
//! assert!(matches!(
//!     jsonsafe::validator_for(&schema),
//!     Err(CompileError::TypeMismatch { .. })
//! ));
//! assert!(jsonsafe::options().with_mode(Mode::Permissive).build(&schema).is_ok());
//! ```
//!
//! # Defaults and unlisted members
//!
//! [`Validator::validate_mut`] fills in `default` values and, with
//! [`ValidationOptions::should_remove_unlisted`], drops members that `additionalProperties: false`
//! or `items: false` would reject, before validating.
//!
//! ```rust
//! use serde_json::json;
//!
//! let validator = jsonsafe::options()
//!     .should_apply_defaults(true)
//!     .build(&json!({"properties": {"retries": {"type": "integer", "default": 3}}}))
//!     .expect("Valid schema");
//! let mut instance = json!({});
//! assert!(validator.validate_mut(&mut instance).valid);
//! assert_eq!(instance, json!({"retries": 3}));
//! ```
//!
//! # Listing
//!
//! Every check the compiler builds is also written to a listing: a self-contained module in
//! JavaScript syntax, built from template fragments that escape every schema-provided
//! value. [`Validator::listing`] returns it, which makes the compiled form of a schema easy to
//! review.
pub(crate) mod compiler;
mod error;
mod formats;
pub(crate) mod keywords;
mod lines;
mod node;
mod options;
mod paths;
mod primitives;
mod regex;
mod scope;
mod template;
mod tracer;
mod types;
mod validator;

pub use error::{CompileError, ValidationError, ValidationErrorKind, ValidationOutput};
pub use formats::Format;
pub use jsonsafe_referencing::Draft;
pub use options::{Mode, ValidationOptions};
pub use paths::{Location, LocationSegment};
pub use template::TemplateError;
pub use types::{JsonType, JsonTypeSet};
pub use validator::Validator;

use serde_json::Value;

/// Default compilation options, to be customized with the builder methods.
#[must_use]
pub fn options() -> ValidationOptions {
    ValidationOptions::default()
}

/// Compile `schema` with the default options.
///
/// # Errors
///
/// Returns [`CompileError`] if the schema is malformed or contains keywords that can not take
/// effect.
pub fn validator_for(schema: &Value) -> Result<Validator, CompileError> {
    options().build(schema)
}

/// One-off validity check.
///
/// # Panics
///
/// Panics if `schema` does not compile. Use [`validator_for`] to handle compile errors.
#[must_use]
pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    match validator_for(schema) {
        Ok(validator) => validator.is_valid(instance),
        Err(error) => panic!("Invalid schema: {error}"),
    }
}
