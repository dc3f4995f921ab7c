//! Compilation options.
use std::{fmt, sync::Arc};

use ahash::AHashMap;
use jsonsafe_referencing::Draft;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{compiler, formats::Format, CompileError, Validator};

/// How forgiving the compiler is towards schema authoring mistakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Unknown keywords and formats are ignored.
    Permissive,
    /// Unknown keywords are errors.
    #[default]
    Standard,
    /// On top of `Standard`, every string, object and array node has to be fully constrained,
    /// `$schema` is mandatory and regexes must be anchored.
    Strict,
}

impl Mode {
    pub(crate) fn is_permissive(self) -> bool {
        self == Mode::Permissive
    }

    pub(crate) fn is_strict(self) -> bool {
        self == Mode::Strict
    }
}

/// Configuration for compiling a schema into a [`Validator`].
///
/// ```rust
/// # fn main() -> Result<(), jsonsafe::CompileError> {
/// use jsonsafe::Mode;
/// use serde_json::json;
///
/// let schema = json!({
///     "$schema": "https://json-schema.org/draft/2020-12/schema",
///     "type": "integer"
/// });
/// let validator = jsonsafe::options()
///     .with_mode(Mode::Strict)
///     .should_collect_all_errors(true)
///     .build(&schema)?;
/// assert!(validator.is_valid(&json!(42)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub(crate) mode: Mode,
    pub(crate) collect_all_errors: bool,
    pub(crate) include_error_details: bool,
    pub(crate) apply_defaults: bool,
    pub(crate) remove_unlisted: bool,
    pub(crate) assume_trusted_input: bool,
    pub(crate) additional_schemas: AHashMap<String, Value>,
    #[serde(skip)]
    pub(crate) custom_formats: AHashMap<String, Format>,
    pub(crate) disable_weak_formats: bool,
    pub(crate) enable_extra_formats: bool,
    #[serde(deserialize_with = "deserialize_draft")]
    pub(crate) default_schema_version: Draft,
    pub(crate) content_validation: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            mode: Mode::default(),
            collect_all_errors: false,
            include_error_details: true,
            apply_defaults: false,
            remove_unlisted: false,
            assume_trusted_input: false,
            additional_schemas: AHashMap::new(),
            custom_formats: AHashMap::new(),
            disable_weak_formats: false,
            enable_extra_formats: false,
            default_schema_version: Draft::default(),
            content_validation: false,
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut custom_formats: Vec<_> = self.custom_formats.keys().collect();
        custom_formats.sort_unstable();
        f.debug_struct("ValidationOptions")
            .field("mode", &self.mode)
            .field("collect_all_errors", &self.collect_all_errors)
            .field("include_error_details", &self.include_error_details)
            .field("apply_defaults", &self.apply_defaults)
            .field("remove_unlisted", &self.remove_unlisted)
            .field("assume_trusted_input", &self.assume_trusted_input)
            .field("additional_schemas", &self.additional_schemas.keys())
            .field("custom_formats", &custom_formats)
            .field("disable_weak_formats", &self.disable_weak_formats)
            .field("enable_extra_formats", &self.enable_extra_formats)
            .field("default_schema_version", &self.default_schema_version)
            .field("content_validation", &self.content_validation)
            .finish()
    }
}

/// Parse a dialect from a short name (`draft7`, `2020-12`) or a meta-schema URI.
pub(crate) fn parse_draft(name: &str) -> Option<Draft> {
    match name.trim_start_matches("draft").trim_start_matches('-') {
        "4" | "04" => Some(Draft::Draft4),
        "6" | "06" => Some(Draft::Draft6),
        "7" | "07" => Some(Draft::Draft7),
        "2019-09" | "201909" => Some(Draft::Draft201909),
        "2020-12" | "202012" => Some(Draft::Draft202012),
        _ => Draft::detect(&serde_json::json!({ "$schema": name }))
            .ok()
            .flatten(),
    }
}

fn deserialize_draft<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Draft, D::Error> {
    let name = String::deserialize(deserializer)?;
    parse_draft(&name)
        .ok_or_else(|| serde::de::Error::custom(format!("Unknown schema version: {name}")))
}

impl ValidationOptions {
    /// Compile `schema` with these options.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the schema is malformed or violates the rules of the selected
    /// [`Mode`].
    pub fn build(&self, schema: &Value) -> Result<Validator, CompileError> {
        compiler::build(self, schema)
    }

    /// Set the conformance mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Report every failure instead of stopping at the first one.
    #[must_use]
    pub fn should_collect_all_errors(mut self, yes: bool) -> Self {
        self.collect_all_errors = yes;
        self
    }

    /// Produce structured errors. When off, validation only reports the outcome.
    #[must_use]
    pub fn should_include_error_details(mut self, yes: bool) -> Self {
        self.include_error_details = yes;
        self
    }

    /// Fill in missing properties and items from `default` in [`Validator::validate_mut`].
    #[must_use]
    pub fn should_apply_defaults(mut self, yes: bool) -> Self {
        self.apply_defaults = yes;
        self
    }

    /// Drop members rejected by `additionalProperties: false` / `additionalItems: false` in
    /// [`Validator::validate_mut`].
    #[must_use]
    pub fn should_remove_unlisted(mut self, yes: bool) -> Self {
        self.remove_unlisted = yes;
        self
    }

    /// Input comes from a strict parser, so presence guards are only needed for optional members.
    #[must_use]
    pub fn should_assume_trusted_input(mut self, yes: bool) -> Self {
        self.assume_trusted_input = yes;
        self
    }

    /// Register a document that `$ref` can point to by `id`.
    #[must_use]
    pub fn with_schema(mut self, id: impl Into<String>, document: Value) -> Self {
        self.additional_schemas.insert(id.into(), document);
        self
    }

    /// Register a custom format matcher. It overrides a built-in format with the same name.
    #[must_use]
    pub fn with_format(mut self, name: impl Into<String>, format: Format) -> Self {
        self.custom_formats.insert(name.into(), format);
        self
    }

    /// Register a custom format from a plain function or closure.
    #[must_use]
    pub fn with_format_fn<F>(self, name: impl Into<String>, format: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.with_format(name, Arc::new(format))
    }

    #[must_use]
    pub fn with_disable_weak_formats(mut self, yes: bool) -> Self {
        self.disable_weak_formats = yes;
        self
    }

    #[must_use]
    pub fn with_enable_extra_formats(mut self, yes: bool) -> Self {
        self.enable_extra_formats = yes;
        self
    }

    /// Dialect for documents that do not declare `$schema`.
    #[must_use]
    pub fn with_default_schema_version(mut self, draft: Draft) -> Self {
        self.default_schema_version = draft;
        self
    }

    /// Make `contentEncoding`, `contentMediaType` and `contentSchema` assertions.
    #[must_use]
    pub fn should_validate_content(mut self, yes: bool) -> Self {
        self.content_validation = yes;
        self
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }
}
