use jsonsafe_referencing::Draft;
use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{ValidationError, ValidationErrorKind},
    keywords::{helpers, ApplicatorResult},
    node::SchemaNode,
    paths::{LazyLocation, Location},
    template::{format, Arg},
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

pub(crate) struct ContainsValidator {
    node: SchemaNode,
    min: u64,
    max: Option<u64>,
    /// Whether `minContains` is explicit; otherwise a failure is reported as `contains`.
    explicit_min: bool,
    /// Whether matching items count as evaluated for `unevaluatedItems`.
    annotates: bool,
    location: Location,
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn compile<'a>(
    ctx: &compiler::Context<'a>,
    schema: &'a Value,
    min_contains: Option<&'a Value>,
    max_contains: Option<&'a Value>,
) -> ApplicatorResult {
    let min = match min_contains {
        Some(value) => helpers::non_negative_integer(ctx, "minContains", value)?,
        None => 1,
    };
    let max = match max_contains {
        Some(value) => Some(helpers::non_negative_integer(ctx, "maxContains", value)?),
        None => None,
    };
    if let (Some(low), Some(high)) = (min_contains, max_contains) {
        helpers::check_range(ctx, ("minContains", low), ("maxContains", high))?;
    }
    let count = ctx.name("count")?;
    let index = ctx.name("i")?;
    ctx.write(&format("let %s = 0", &[Arg::Code(&count)])?)?;
    let open = format(
        "for (let %s = 0; %s < %s.length; %s++) {",
        &[Arg::Code(&index), Arg::Code(&index), Arg::Code(ctx.data()), Arg::Code(&index)],
    )?;
    let node = ctx.block(&open, || {
        let child = ctx
            .descend("contains", ctx.item_data(&index)?, true)
            .as_conditional();
        let node = compiler::compile(&child, schema)?.node;
        ctx.write(&format("%s++", &[Arg::Code(&count)])?)?;
        Ok::<_, CompileStop>(node)
    })?;
    if min > 0 {
        let keyword = if min_contains.is_some() { "minContains" } else { "contains" };
        ctx.check(
            &format("%s < %d", &[Arg::Code(&count), Arg::Number(min as f64)])?,
            keyword,
        )?;
    }
    if let Some(max) = max {
        ctx.check(
            &format("%s > %d", &[Arg::Code(&count), Arg::Number(max as f64)])?,
            "maxContains",
        )?;
    }
    let annotates = ctx.draft >= Draft::Draft202012;
    let delta = if annotates {
        EvaluationDelta::neutral().into_dynamic()
    } else {
        EvaluationDelta::neutral()
    };
    Ok((
        Box::new(ContainsValidator {
            node,
            min,
            max,
            explicit_min: min_contains.is_some(),
            annotates,
            location: ctx.location().clone(),
        }),
        delta,
    ))
}

impl ContainsValidator {
    fn count(&self, items: &[Value], ctx: &mut ValidationContext) -> u64 {
        let mut count = 0;
        for item in items {
            if self.node.is_valid(item, ctx) {
                count += 1;
                if self.max.is_none() && count >= self.min {
                    break;
                }
            }
        }
        count
    }
}

impl Validate for ContainsValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        if let Value::Array(items) = instance {
            let count = self.count(items, ctx);
            count >= self.min && self.max.map_or(true, |max| count <= max)
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
        let Value::Array(items) = instance else {
            return Ok(());
        };
        let count = self.count(items, ctx);
        let (keyword, kind) = if count < self.min {
            if self.explicit_min {
                ("minContains", ValidationErrorKind::MinContains { limit: self.min })
            } else {
                ("contains", ValidationErrorKind::Contains)
            }
        } else {
            match self.max {
                Some(max) if count > max => {
                    ("maxContains", ValidationErrorKind::MaxContains { limit: max })
                }
                _ => return Ok(()),
            }
        };
        Err(ValidationError::new(
            self.location.join(keyword),
            location.materialize(),
            instance,
            kind,
        ))
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        if !self.annotates {
            return;
        }
        if let Value::Array(items) = instance {
            for (idx, item) in items.iter().enumerate() {
                if self.node.is_valid(item, ctx) {
                    evaluated.mark_index(idx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    #[test_case(&json!({"contains": {"const": 1}}), &json!([0, 1]), true)]
    #[test_case(&json!({"contains": {"const": 1}}), &json!([0, 2]), false)]
    #[test_case(&json!({"contains": {"const": 1}}), &json!([]), false)]
    #[test_case(&json!({"contains": {"const": 1}, "minContains": 0}), &json!([]), true)]
    #[test_case(&json!({"contains": {"const": 1}, "minContains": 2}), &json!([1, 0, 1]), true)]
    #[test_case(&json!({"contains": {"const": 1}, "maxContains": 1}), &json!([1, 1]), false)]
    #[test_case(&json!({"contains": {"const": 1}}), &json!({"a": 1}), true)]
    fn test_contains(schema: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(schema).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test_case(&json!({"contains": {"const": 1}}), ValidationErrorKind::Contains, "/contains")]
    #[test_case(&json!({"contains": {"const": 1}, "minContains": 2}), ValidationErrorKind::MinContains { limit: 2 }, "/minContains")]
    fn test_error(schema: &Value, kind: ValidationErrorKind, keyword_location: &str) {
        let validator = crate::validator_for(schema).expect("Valid schema");
        let instance = json!([0]);
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].kind, kind);
        assert_eq!(output.errors[0].keyword_location.as_str(), keyword_location);
    }

    #[test]
    fn test_max_contains_without_contains() {
        assert!(crate::validator_for(&json!({"maxContains": 1})).is_err());
    }
}
