use serde_json::Value;

use crate::{
    compiler,
    error::{no_error, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    node::SchemaNode,
    paths::{LazyLocation, Location},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct PropertyNamesValidator {
    node: SchemaNode,
    location: Location,
}

#[inline]
pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, schema: &'a Value) -> CompilationResult {
    let key = ctx.name("key")?;
    let open = format(
        "for (const %s of Object.keys(%s)) {",
        &[Arg::Code(&key), Arg::Code(ctx.data())],
    )?;
    let child = ctx.descend("propertyNames", key, true).as_conditional();
    let node = ctx.block(&open, || compiler::compile(&child, schema))?.node;
    Ok(Box::new(PropertyNamesValidator {
        node,
        location: ctx.keyword_location("propertyNames"),
    }))
}

impl PropertyNamesValidator {
    fn invalid_names<'m>(
        &self,
        map: &'m serde_json::Map<String, Value>,
        ctx: &mut ValidationContext,
        limit: usize,
    ) -> Vec<&'m String> {
        let mut invalid = Vec::new();
        for name in map.keys() {
            if invalid.len() == limit {
                break;
            }
            if !self.node.is_valid(&Value::String(name.clone()), ctx) {
                invalid.push(name);
            }
        }
        invalid
    }
}

impl Validate for PropertyNamesValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        if let Value::Object(map) = instance {
            self.invalid_names(map, ctx, 1).is_empty()
        } else {
            true
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        let Value::Object(map) = instance else {
            return Ok(());
        };
        match self.invalid_names(map, ctx, 1).first() {
            Some(name) => Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::PropertyNames {
                    property: (*name).clone(),
                },
            )),
            None => Ok(()),
        }
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        let Value::Object(map) = instance else {
            return no_error();
        };
        let names: Vec<String> = self
            .invalid_names(map, ctx, usize::MAX)
            .into_iter()
            .cloned()
            .collect();
        let location = location.materialize();
        let keyword_location = self.location.clone();
        Box::new(names.into_iter().map(move |property| {
            ValidationError::new(
                keyword_location.clone(),
                location.clone(),
                instance,
                ValidationErrorKind::PropertyNames { property },
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    #[test_case(&json!({"ab": 1}), true)]
    #[test_case(&json!({"abcd": 1}), false)]
    #[test_case(&json!({}), true)]
    #[test_case(&json!("abcd"), true)]
    fn test_property_names(instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({"propertyNames": {"maxLength": 3}}))
            .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_error() {
        let validator = crate::options()
            .should_collect_all_errors(true)
            .build(&json!({"propertyNames": {"pattern": "^a"}}))
            .expect("Valid schema");
        let instance = json!({"ab": 1, "b": 2, "c": 3});
        let output = validator.validate(&instance);
        assert_eq!(output.errors.len(), 2);
        assert_eq!(
            output.errors[0].kind,
            ValidationErrorKind::PropertyNames {
                property: "b".to_string()
            }
        );
        assert_eq!(output.errors[0].keyword_location.as_str(), "/propertyNames");
    }
}
