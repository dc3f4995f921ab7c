//! `prefixItems` / `items` / `additionalItems`.
//!
//! Every dialect splits an array into a positional prefix and the rest: 2020-12 uses
//! `prefixItems` + `items`, older dialects use an `items` array + `additionalItems`.
use jsonsafe_referencing::Draft;
use serde_json::Value;

use crate::{
    compiler,
    error::{no_error, CompileError, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::ApplicatorResult,
    node::SchemaNode,
    paths::{LazyLocation, Location},
    template::{format, Arg},
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

enum Rest {
    Absent,
    Schema(SchemaNode),
    /// `false`: nothing past the prefix.
    Forbidden(Location),
}

pub(crate) struct ItemsValidator {
    prefix: Vec<SchemaNode>,
    defaults: Vec<Option<Value>>,
    rest: Rest,
    remove_unlisted: bool,
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn compile<'a>(
    ctx: &compiler::Context<'a>,
    prefix: Option<(&'static str, &'a Value)>,
    rest: Option<(&'static str, &'a Value)>,
) -> ApplicatorResult {
    let mut nodes = Vec::new();
    let mut defaults = Vec::new();
    if let Some((keyword, value)) = prefix {
        let Value::Array(schemas) = value else {
            return Err(CompileError::invalid_keyword(
                ctx.location(),
                keyword,
                value,
                "expected an array of schemas",
            )
            .into());
        };
        let prefix_ctx = ctx.new_at_location(keyword);
        for (idx, schema) in schemas.iter().enumerate() {
            let index = format("%d", &[Arg::Number(idx as f64)])?;
            let child = prefix_ctx.descend(idx, ctx.item_data(&index)?, false);
            nodes.push(child.when_present(|| compiler::compile(&child, schema))?.node);
            defaults.push(if ctx.options().apply_defaults {
                schema.get("default").cloned()
            } else {
                None
            });
        }
    }
    let count = nodes.len();
    let rest = match rest {
        None => Rest::Absent,
        Some((keyword, Value::Bool(true))) => {
            Rest::Schema(SchemaNode::new(Vec::new(), ctx.keyword_location(keyword)))
        }
        Some((keyword, Value::Bool(false)))
            if ctx.draft != Draft::Draft4 || keyword == "additionalItems" =>
        {
            ctx.forbid_conditional_removal(keyword)?;
            ctx.check(
                &format("%s.length > %d", &[Arg::Code(ctx.data()), Arg::Number(count as f64)])?,
                keyword,
            )?;
            Rest::Forbidden(ctx.keyword_location(keyword))
        }
        Some((keyword, value)) => {
            if ctx.draft >= Draft::Draft202012 && value.is_array() {
                return Err(CompileError::invalid_keyword(
                    ctx.location(),
                    keyword,
                    value,
                    "expected a schema, use 'prefixItems' for tuples",
                )
                .into());
            }
            let index = ctx.name("i")?;
            let open = format(
                "for (let %s = %d; %s < %s.length; %s++) {",
                &[
                    Arg::Code(&index),
                    Arg::Number(count as f64),
                    Arg::Code(&index),
                    Arg::Code(ctx.data()),
                    Arg::Code(&index),
                ],
            )?;
            let child = ctx.descend(keyword, ctx.item_data(&index)?, true);
            Rest::Schema(ctx.block(&open, || compiler::compile(&child, value))?.node)
        }
    };
    let delta = match rest {
        Rest::Absent => EvaluationDelta::items(count as u64),
        Rest::Schema(_) | Rest::Forbidden(_) => EvaluationDelta::all_items(),
    };
    Ok((
        Box::new(ItemsValidator {
            prefix: nodes,
            defaults,
            rest,
            remove_unlisted: ctx.options().remove_unlisted,
        }),
        delta,
    ))
}

impl Validate for ItemsValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        let Value::Array(items) = instance else {
            return true;
        };
        if !self.prefix.iter().zip(items).all(|(node, item)| node.is_valid(item, ctx)) {
            return false;
        }
        match &self.rest {
            Rest::Absent => true,
            Rest::Forbidden(_) => items.len() <= self.prefix.len(),
            Rest::Schema(node) => items
                .iter()
                .skip(self.prefix.len())
                .all(|item| node.is_valid(item, ctx)),
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
        for (idx, (node, item)) in self.prefix.iter().zip(items).enumerate() {
            node.validate(item, &location.push(idx), ctx)?;
        }
        match &self.rest {
            Rest::Absent => {}
            Rest::Forbidden(keyword_location) => {
                if items.len() > self.prefix.len() {
                    return Err(ValidationError::new(
                        keyword_location.clone(),
                        location.materialize(),
                        instance,
                        ValidationErrorKind::AdditionalItems {
                            limit: self.prefix.len(),
                        },
                    ));
                }
            }
            Rest::Schema(node) => {
                for (idx, item) in items.iter().enumerate().skip(self.prefix.len()) {
                    node.validate(item, &location.push(idx), ctx)?;
                }
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
        let Value::Array(items) = instance else {
            return no_error();
        };
        let mut errors = Vec::new();
        for (idx, (node, item)) in self.prefix.iter().zip(items).enumerate() {
            errors.extend(node.iter_errors(item, &location.push(idx), ctx));
        }
        match &self.rest {
            Rest::Absent => {}
            Rest::Forbidden(keyword_location) => {
                if items.len() > self.prefix.len() {
                    errors.push(ValidationError::new(
                        keyword_location.clone(),
                        location.materialize(),
                        instance,
                        ValidationErrorKind::AdditionalItems {
                            limit: self.prefix.len(),
                        },
                    ));
                }
            }
            Rest::Schema(node) => {
                for (idx, item) in items.iter().enumerate().skip(self.prefix.len()) {
                    errors.extend(node.iter_errors(item, &location.push(idx), ctx));
                }
            }
        }
        Box::new(errors.into_iter())
    }

    fn record(&self, instance: &Value, _ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        if let Value::Array(items) = instance {
            match self.rest {
                Rest::Absent => evaluated.mark_prefix(self.prefix.len().min(items.len())),
                Rest::Schema(_) | Rest::Forbidden(_) => evaluated.mark_all_items(),
            }
        }
    }

    fn normalize(&self, instance: &mut Value, ctx: &mut ValidationContext) {
        let Value::Array(items) = instance else {
            return;
        };
        for (idx, default) in self.defaults.iter().enumerate() {
            match default {
                Some(default) if items.len() == idx => items.push(default.clone()),
                _ => {}
            }
        }
        if self.remove_unlisted && matches!(self.rest, Rest::Forbidden(_)) {
            items.truncate(self.prefix.len());
        }
        for (node, item) in self.prefix.iter().zip(items.iter_mut()) {
            node.normalize(item, ctx);
        }
        if let Rest::Schema(node) = &self.rest {
            for item in items.iter_mut().skip(self.prefix.len()) {
                node.normalize(item, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    #[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": {"type": "string"}}), &json!([1, "a", "b"]), true)]
    #[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": {"type": "string"}}), &json!([1, "a", 2]), false)]
    #[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": false}), &json!([1, 2]), false)]
    #[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": false}), &json!([]), true)]
    #[test_case(&json!({"$schema": "http://json-schema.org/draft-07/schema#", "items": [{"type": "integer"}], "additionalItems": false}), &json!([1, 2]), false)]
    #[test_case(&json!({"$schema": "http://json-schema.org/draft-07/schema#", "items": {"type": "integer"}}), &json!([1, "2"]), false)]
    #[test_case(&json!({"items": {"type": "integer"}}), &json!("not an array"), true)]
    fn test_items(schema: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(schema).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_tuple_items_in_2020_12() {
        assert!(crate::validator_for(&json!({"items": [{"type": "integer"}]})).is_err());
    }

    #[test]
    fn test_additional_items_error() {
        let validator = crate::validator_for(&json!({"prefixItems": [{}], "items": false}))
            .expect("Valid schema");
        let instance = json!([1, 2, 3]);
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].kind, ValidationErrorKind::AdditionalItems { limit: 1 });
        assert_eq!(output.errors[0].keyword_location.as_str(), "/items");
    }

    #[test]
    fn test_item_error_location() {
        let validator = crate::validator_for(&json!({"items": {"type": "integer"}}))
            .expect("Valid schema");
        let instance = json!([1, 2, "3"]);
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].instance_location.as_str(), "/2");
        assert_eq!(output.errors[0].keyword_location.as_str(), "/items/type");
    }
}
