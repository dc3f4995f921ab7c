use serde_json::Value;

use crate::{
    compiler,
    error::{ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    template::format,
    validator::{Validate, ValidationContext},
};

pub(crate) struct FalseValidator {
    location: Location,
}

impl FalseValidator {
    #[inline]
    pub(crate) fn compile(ctx: &compiler::Context) -> CompilationResult {
        ctx.check_at(&format("true", &[])?, ctx.location())?;
        Ok(Box::new(FalseValidator {
            location: ctx.location().clone(),
        }))
    }
}

impl Validate for FalseValidator {
    fn is_valid(&self, _: &Value, _ctx: &mut ValidationContext) -> bool {
        false
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        _ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        Err(ValidationError::new(
            self.location.clone(),
            location.materialize(),
            instance,
            ValidationErrorKind::FalseSchema,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::ValidationErrorKind;

    #[test]
    fn test_false_schema() {
        let validator = crate::validator_for(&json!({"properties": {"a": false}}))
            .expect("Valid schema");
        let instance = json!({"a": 1});
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].kind, ValidationErrorKind::FalseSchema);
        assert_eq!(output.errors[0].keyword_location.as_str(), "/properties/a");
        assert_eq!(output.errors[0].instance_location.as_str(), "/a");
        assert!(validator.is_valid(&json!({"b": 1})));
    }

    #[test]
    fn test_false_root() {
        let validator = crate::validator_for(&json!(false)).expect("Valid schema");
        assert!(!validator.is_valid(&json!(null)));
        assert!(validator.listing().contains("return fail(\"\")"));
    }
}
