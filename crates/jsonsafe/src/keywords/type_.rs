use std::str::FromStr;

use jsonsafe_referencing::Draft;
use serde_json::Value;

use crate::{
    compiler,
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    template::{format, Arg, SafeCode, TemplateError},
    types::{JsonType, JsonTypeSet},
    validator::{Validate, ValidationContext},
};

pub(crate) struct TypeValidator {
    types: JsonTypeSet,
    strict_integers: bool,
    location: Location,
}

/// Parse the value of `type`: a type name or a non-empty list of unique names.
pub(crate) fn parse(ctx: &compiler::Context, value: &Value) -> Result<JsonTypeSet, CompileError> {
    let invalid =
        |reason: &'static str| CompileError::invalid_keyword(ctx.location(), "type", value, reason);
    let parse_one = |item: &Value| {
        item.as_str()
            .and_then(|name| JsonType::from_str(name).ok())
            .ok_or_else(|| invalid("expected a JSON type name"))
    };
    match value {
        Value::String(_) => Ok(JsonTypeSet::empty().insert(parse_one(value)?)),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(invalid("expected at least one type"));
            }
            let mut types = JsonTypeSet::empty();
            for item in items {
                let ty = parse_one(item)?;
                if types.iter().any(|known| known == ty) {
                    return Err(invalid("types must be unique"));
                }
                types = types.insert(ty);
            }
            Ok(types)
        }
        _ => Err(invalid("expected a string or an array of strings")),
    }
}

/// Listing condition that holds when `data` is of the given type.
pub(crate) fn guard(ty: JsonType, data: &SafeCode) -> Result<SafeCode, TemplateError> {
    let template = match ty {
        JsonType::Array => "Array.isArray(%s)",
        JsonType::Object => "typeof %s === \"object\" && %s !== null && !Array.isArray(%s)",
        JsonType::Integer => "Number.isInteger(%s)",
        JsonType::Number => "typeof %s === \"number\"",
        JsonType::String => "typeof %s === \"string\"",
        JsonType::Boolean => "typeof %s === \"boolean\"",
        JsonType::Null => "%s === null",
    };
    let args: Vec<_> = (0..template.matches("%s").count()).map(|_| Arg::Code(data)).collect();
    format(template, &args)
}

#[inline]
pub(crate) fn compile(ctx: &compiler::Context, types: JsonTypeSet) -> CompilationResult {
    let mut condition: Option<SafeCode> = None;
    for ty in types.iter() {
        let check = guard(ty, ctx.data())?;
        condition = Some(match condition {
            None => format("(%s)", &[Arg::Code(&check)])?,
            Some(previous) => format("%s || (%s)", &[Arg::Code(&previous), Arg::Code(&check)])?,
        });
    }
    if let Some(condition) = condition {
        ctx.check(&format("!(%s)", &[Arg::Code(&condition)])?, "type")?;
    }
    Ok(Box::new(TypeValidator {
        types,
        strict_integers: ctx.draft == Draft::Draft4,
        location: ctx.keyword_location("type"),
    }))
}

impl Validate for TypeValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        self.types.contains_value_type(instance, self.strict_integers)
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if self.is_valid(instance, ctx) {
            Ok(())
        } else {
            Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::Type { types: self.types },
            ))
        }
    }
}
