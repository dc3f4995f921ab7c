//! `contentEncoding`, `contentMediaType` and `contentSchema`.
//!
//! They are annotations unless content validation is enabled. Only the `base64` encoding and the
//! `application/json` media type are understood.
use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{error, no_error, CompileError, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::BoxedValidator,
    node::SchemaNode,
    paths::{LazyLocation, Location},
    primitives::{decode_base64, Primitive},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct ContentValidator {
    encoding: Option<(String, Location)>,
    media_type: Option<(String, Location)>,
    schema: Option<SchemaNode>,
}

enum Decoded {
    Value(Value),
    BadEncoding,
    BadMediaType,
}

fn supported(
    ctx: &compiler::Context,
    keyword: &str,
    value: Option<&Value>,
    known: &str,
) -> Result<Option<(String, Location)>, CompileError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let Value::String(name) = value else {
        return Err(CompileError::invalid_keyword(
            ctx.location(),
            keyword,
            value,
            "expected a string",
        ));
    };
    if name.eq_ignore_ascii_case(known) {
        return Ok(Some((name.clone(), ctx.keyword_location(keyword))));
    }
    if ctx.options().mode.is_permissive() {
        return Ok(None);
    }
    Err(CompileError::invalid_keyword(
        ctx.location(),
        keyword,
        value,
        format!("only {known:?} is supported"),
    ))
}

pub(crate) fn compile<'a>(
    ctx: &compiler::Context<'a>,
    encoding: Option<&'a Value>,
    media_type: Option<&'a Value>,
    schema: Option<&'a Value>,
) -> Result<Option<BoxedValidator>, CompileStop> {
    if !ctx.options().content_validation {
        return Ok(None);
    }
    let encoding = supported(ctx, "contentEncoding", encoding, "base64")?;
    let media_type = supported(ctx, "contentMediaType", media_type, "application/json")?;
    if encoding.is_none() && media_type.is_none() {
        return Ok(None);
    }
    let mut text = ctx.data().clone();
    if encoding.is_some() {
        let decode = ctx.scope.primitive(Primitive::DecodeBase64)?;
        let decoded = ctx.name("decoded")?;
        ctx.write(&format(
            "const %s = %s(%s)",
            &[Arg::Code(&decoded), Arg::Code(&decode), Arg::Code(ctx.data())],
        )?)?;
        ctx.check(&format("%s === undefined", &[Arg::Code(&decoded)])?, "contentEncoding")?;
        text = decoded;
    }
    let mut compiled_schema = None;
    if media_type.is_some() {
        ctx.check(
            &format(
                "(() => { try { JSON.parse(%s); return false } catch (e) { return true } })()",
                &[Arg::Code(&text)],
            )?,
            "contentMediaType",
        )?;
        if let Some(schema) = schema {
            let parsed = ctx.name("parsed")?;
            ctx.write(&format(
                "const %s = JSON.parse(%s)",
                &[Arg::Code(&parsed), Arg::Code(&text)],
            )?)?;
            let child = ctx.descend("contentSchema", parsed, true).as_conditional();
            compiled_schema = Some(compiler::compile(&child, schema)?.node);
        }
    }
    Ok(Some(Box::new(ContentValidator {
        encoding,
        media_type,
        schema: compiled_schema,
    })))
}

impl ContentValidator {
    fn decode(&self, item: &str) -> Decoded {
        let bytes = if self.encoding.is_some() {
            match decode_base64(item) {
                Some(bytes) => bytes,
                None => return Decoded::BadEncoding,
            }
        } else {
            item.as_bytes().to_vec()
        };
        if self.media_type.is_none() {
            return Decoded::Value(Value::Null);
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Decoded::Value(value),
            Err(_) => Decoded::BadMediaType,
        }
    }

    fn error<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        decoded: &Decoded,
    ) -> Option<ValidationError<'i>> {
        let (kind, keyword_location) = match (decoded, &self.encoding, &self.media_type) {
            (Decoded::BadEncoding, Some((name, keyword_location)), _) => (
                ValidationErrorKind::ContentEncoding {
                    content_encoding: name.clone(),
                },
                keyword_location,
            ),
            (Decoded::BadMediaType, _, Some((name, keyword_location))) => (
                ValidationErrorKind::ContentMediaType {
                    content_media_type: name.clone(),
                },
                keyword_location,
            ),
            _ => return None,
        };
        Some(ValidationError::new(
            keyword_location.clone(),
            location.materialize(),
            instance,
            kind,
        ))
    }
}

impl Validate for ContentValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        let Value::String(item) = instance else {
            return true;
        };
        match self.decode(item) {
            Decoded::Value(value) => self
                .schema
                .as_ref()
                .map_or(true, |schema| schema.is_valid(&value, ctx)),
            Decoded::BadEncoding | Decoded::BadMediaType => false,
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        let Value::String(item) = instance else {
            return Ok(());
        };
        let decoded = self.decode(item);
        if let Some(error) = self.error(instance, location, &decoded) {
            return Err(error);
        }
        if let (Decoded::Value(value), Some(schema)) = (&decoded, &self.schema) {
            if let Err(error) = schema.validate(value, location, ctx) {
                return Err(error.to_owned());
            }
        }
        Ok(())
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        let Value::String(item) = instance else {
            return no_error();
        };
        let decoded = self.decode(item);
        if let Some(failure) = self.error(instance, location, &decoded) {
            return error(failure);
        }
        match (&decoded, &self.schema) {
            (Decoded::Value(value), Some(schema)) => {
                let errors: Vec<ValidationError<'i>> = schema
                    .iter_errors(value, location, ctx)
                    .map(|error| -> ValidationError<'i> { error.to_owned() })
                    .collect();
                Box::new(errors.into_iter())
            }
            _ => no_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    fn schema() -> Value {
        json!({
            "contentEncoding": "base64",
            "contentMediaType": "application/json",
            "contentSchema": {"type": "object", "required": ["a"]}
        })
    }

    // `{"a":1}`, `{}` and `{"a"` in base64
    #[test_case("eyJhIjoxfQ==", true)]
    #[test_case("e30=", false)]
    #[test_case("eyJhIg==", false)]
    #[test_case("not base64!", false)]
    fn test_content(value: &str, expected: bool) {
        let validator = crate::options()
            .should_validate_content(true)
            .build(&schema())
            .expect("Valid schema");
        assert_eq!(validator.is_valid(&json!(value)), expected);
    }

    #[test]
    fn test_annotations_by_default() {
        let validator = crate::validator_for(&schema()).expect("Valid schema");
        assert!(validator.is_valid(&json!("not base64!")));
    }

    #[test]
    fn test_error_kinds() {
        let validator = crate::options()
            .should_validate_content(true)
            .build(&schema())
            .expect("Valid schema");
        let instance = json!("not base64!");
        let output = validator.validate(&instance);
        assert!(matches!(output.errors[0].kind, ValidationErrorKind::ContentEncoding { .. }));
        let instance = json!("eyJhIg==");
        let output = validator.validate(&instance);
        assert!(matches!(output.errors[0].kind, ValidationErrorKind::ContentMediaType { .. }));
        let instance = json!("e30=");
        let output = validator.validate(&instance);
        assert!(matches!(output.errors[0].kind, ValidationErrorKind::Required { .. }));
        assert_eq!(output.errors[0].keyword_location.as_str(), "/contentSchema/required");
    }

    #[test]
    fn test_unsupported_encoding() {
        let options = crate::options().should_validate_content(true);
        assert!(options.build(&json!({"contentEncoding": "base32"})).is_err());
    }
}
