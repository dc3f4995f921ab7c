use serde_json::Value;

use crate::{
    compiler,
    error::{ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    node::SchemaNode,
    paths::{LazyLocation, Location},
    validator::{Validate, ValidationContext},
};

pub(crate) struct NotValidator {
    // needed only for error representation
    original: Value,
    node: SchemaNode,
    location: Location,
}

#[inline]
pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, schema: &'a Value) -> CompilationResult {
    let child = ctx.new_at_location("not").as_conditional();
    let (ok, node) = ctx.subcheck(|| Ok(compiler::compile(&child, schema)?.node))?;
    ctx.check(&ok, "not")?;
    Ok(Box::new(NotValidator {
        original: schema.clone(),
        node,
        location: ctx.keyword_location("not"),
    }))
}

impl Validate for NotValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        !self.node.is_valid(instance, ctx)
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
                ValidationErrorKind::Not {
                    schema: self.original.clone(),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    #[test_case(&json!(1), false)]
    #[test_case(&json!("a"), true)]
    fn test_not(instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({"not": {"type": "integer"}}))
            .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_error() {
        let validator = crate::validator_for(&json!({"not": {"type": "integer"}}))
            .expect("Valid schema");
        let instance = json!(1);
        let output = validator.validate(&instance);
        assert_eq!(
            output.errors[0].kind,
            ValidationErrorKind::Not {
                schema: json!({"type": "integer"})
            }
        );
        assert_eq!(output.errors[0].keyword_location.as_str(), "/not");
    }

    #[test]
    fn test_defaults_under_not() {
        let result = crate::options()
            .should_apply_defaults(true)
            .build(&json!({"not": {"properties": {"a": {"default": 1}}}}));
        assert!(result.is_err());
    }
}
