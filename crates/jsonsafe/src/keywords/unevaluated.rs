//! `unevaluatedProperties` / `unevaluatedItems`.
//!
//! When the evaluation delta of the sibling keywords is static, the members they cover are known
//! at compile time and the check only looks at the rest. Otherwise the node collects what its
//! siblings evaluated at runtime, via [`Validate::record`], before checking the leftovers.
use std::sync::Arc;

use ahash::AHashSet;
use serde_json::{Map, Value};

use crate::{
    compiler::{self, CompileStop},
    error::{ValidationError, ValidationErrorKind},
    keywords::{pattern, properties::unlisted_condition, BoxedValidator},
    node::SchemaNode,
    paths::{LazyLocation, Location},
    regex::CompiledRegex,
    template::{format, Arg, SafeCode},
    tracer::{EvaluationDelta, Items, Properties},
    validator::{Evaluated, Validate, ValidationContext},
};

/// What applies to members the siblings left unevaluated.
enum Leftover {
    Allowed,
    Forbidden,
    Schema(SchemaNode),
}

struct Rule {
    leftover: Leftover,
    location: Location,
}

impl Rule {
    /// Members among `candidates` the rule rejects.
    fn rejected<'v, K>(
        &self,
        candidates: impl Iterator<Item = (K, &'v Value)>,
        ctx: &mut ValidationContext,
    ) -> Vec<K> {
        match &self.leftover {
            Leftover::Allowed => Vec::new(),
            Leftover::Forbidden => candidates.map(|(key, _)| key).collect(),
            Leftover::Schema(node) => candidates
                .filter(|(_, value)| !node.is_valid(value, ctx))
                .map(|(key, _)| key)
                .collect(),
        }
    }

    fn properties_error<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        unexpected: Vec<String>,
    ) -> Result<(), ValidationError<'i>> {
        if unexpected.is_empty() {
            return Ok(());
        }
        Err(ValidationError::new(
            self.location.clone(),
            location.materialize(),
            instance,
            ValidationErrorKind::UnevaluatedProperties { unexpected },
        ))
    }

    fn items_error<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        unexpected: &[usize],
        items: &[Value],
    ) -> Result<(), ValidationError<'i>> {
        if unexpected.is_empty() {
            return Ok(());
        }
        Err(ValidationError::new(
            self.location.clone(),
            location.materialize(),
            instance,
            ValidationErrorKind::UnevaluatedItems {
                unexpected: unexpected.iter().map(|idx| items[*idx].to_string()).collect(),
            },
        ))
    }
}

/// Properties covered by the sibling keywords.
struct Covered {
    all: bool,
    names: AHashSet<String>,
    patterns: Vec<Arc<CompiledRegex>>,
}

impl Covered {
    fn contains(&self, name: &str) -> bool {
        self.all
            || self.names.contains(name)
            || self
                .patterns
                .iter()
                .any(|regex| regex.is_match(name).unwrap_or(false))
    }
}

pub(crate) struct UnevaluatedPropertiesValidator {
    covered: Covered,
    rule: Rule,
}

pub(crate) struct UnevaluatedItemsValidator {
    covered: Items,
    rule: Rule,
}

/// Runtime-tracked unevaluated keywords of a node.
pub(crate) struct DynamicUnevaluated {
    properties: Option<Rule>,
    items: Option<Rule>,
}

pub(crate) enum Unevaluated {
    Static(Vec<BoxedValidator>),
    Dynamic(DynamicUnevaluated),
}

/// Compile the leftover schema of `keyword` inside the loop over unevaluated members.
fn leftover<'a>(
    ctx: &compiler::Context<'a>,
    keyword: &str,
    value: &'a Value,
    member: SafeCode,
) -> Result<Leftover, CompileStop> {
    Ok(match value {
        Value::Bool(true) => Leftover::Allowed,
        Value::Bool(false) => {
            ctx.check(&format("true", &[])?, keyword)?;
            Leftover::Forbidden
        }
        schema => {
            let child = ctx.descend(keyword, member, true);
            Leftover::Schema(compiler::compile(&child, schema)?.node)
        }
    })
}

/// Loop over the object keys; `skip` tells which keys are already evaluated.
fn properties_rule<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
    unevaluated: impl FnOnce(&SafeCode) -> Result<Option<SafeCode>, CompileStop>,
) -> Result<Rule, CompileStop> {
    let key = ctx.name("key")?;
    let open = format(
        "for (const %s of Object.keys(%s)) {",
        &[Arg::Code(&key), Arg::Code(ctx.data())],
    )?;
    let leftover = ctx.block(&open, || {
        let member = || leftover(ctx, "unevaluatedProperties", value, ctx.item_data(&key)?);
        match unevaluated(&key)? {
            Some(condition) => ctx.block(&format("if (%s) {", &[Arg::Code(&condition)])?, member),
            None => member(),
        }
    })?;
    Ok(Rule {
        leftover,
        location: ctx.keyword_location("unevaluatedProperties"),
    })
}

#[allow(clippy::cast_precision_loss)]
fn items_rule<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
    start: u64,
    dynamic: bool,
) -> Result<Rule, CompileStop> {
    let index = ctx.name("i")?;
    let open = format(
        "for (let %s = %d; %s < %s.length; %s++) {",
        &[
            Arg::Code(&index),
            Arg::Number(start as f64),
            Arg::Code(&index),
            Arg::Code(ctx.data()),
            Arg::Code(&index),
        ],
    )?;
    let leftover = ctx.block(&open, || {
        if dynamic {
            ctx.write(&format("if (evaluated.items.has(%s)) continue", &[Arg::Code(&index)])?)?;
        }
        leftover(ctx, "unevaluatedItems", value, ctx.item_data(&index)?)
    })?;
    Ok(Rule {
        leftover,
        location: ctx.keyword_location("unevaluatedItems"),
    })
}

pub(crate) fn compile<'a>(
    ctx: &compiler::Context<'a>,
    properties: Option<&'a Value>,
    items: Option<&'a Value>,
    delta: &EvaluationDelta,
) -> Result<Unevaluated, CompileStop> {
    if delta.dynamic {
        if !ctx.scope.dynamic {
            tracing::debug!(
                location = %ctx.location(),
                "Evaluated members depend on the passing branch"
            );
            return Err(CompileStop::NeedsDynamic);
        }
        ctx.scope.mark_dynamic();
        let properties = match properties {
            Some(value) => Some(properties_rule(ctx, value, |key| {
                Ok(Some(format("!evaluated.properties.has(%s)", &[Arg::Code(key)])?))
            })?),
            None => None,
        };
        let items = match items {
            Some(value) => Some(items_rule(ctx, value, 0, true)?),
            None => None,
        };
        return Ok(Unevaluated::Dynamic(DynamicUnevaluated { properties, items }));
    }
    let mut validators: Vec<BoxedValidator> = Vec::new();
    if let Some(value) = properties {
        let mut covered = Covered {
            all: false,
            names: AHashSet::new(),
            patterns: Vec::new(),
        };
        let mut names = Vec::new();
        match &delta.properties {
            Properties::All => covered.all = true,
            Properties::Names(known) => {
                names.extend(known.iter().cloned());
                covered.names.extend(known.iter().cloned());
            }
        }
        let mut pattern_names = Vec::new();
        for source in &delta.patterns {
            let (name, regex) =
                pattern::regex(ctx, source, ctx.keyword_location("unevaluatedProperties"))?;
            pattern_names.push(name);
            covered.patterns.push(regex);
        }
        let rule = if covered.all {
            Rule {
                leftover: Leftover::Allowed,
                location: ctx.keyword_location("unevaluatedProperties"),
            }
        } else {
            properties_rule(ctx, value, |key| {
                if names.is_empty() && pattern_names.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(unlisted_condition(ctx, key, &names, &pattern_names)?))
                }
            })?
        };
        validators.push(Box::new(UnevaluatedPropertiesValidator { covered, rule }));
    }
    if let Some(value) = items {
        let rule = match delta.items {
            Items::Unbounded => Rule {
                leftover: Leftover::Allowed,
                location: ctx.keyword_location("unevaluatedItems"),
            },
            Items::Count(count) => items_rule(ctx, value, count, false)?,
        };
        validators.push(Box::new(UnevaluatedItemsValidator {
            covered: delta.items,
            rule,
        }));
    }
    Ok(Unevaluated::Static(validators))
}

impl UnevaluatedPropertiesValidator {
    fn unexpected(&self, map: &Map<String, Value>, ctx: &mut ValidationContext) -> Vec<String> {
        let candidates = map
            .iter()
            .filter(|(name, _)| !self.covered.contains(name))
            .map(|(name, value)| (name.clone(), value));
        self.rule.rejected(candidates, ctx)
    }
}

impl Validate for UnevaluatedPropertiesValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        match instance {
            Value::Object(map) => self.unexpected(map, ctx).is_empty(),
            _ => true,
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        match instance {
            Value::Object(map) => {
                let unexpected = self.unexpected(map, ctx);
                self.rule.properties_error(instance, location, unexpected)
            }
            _ => Ok(()),
        }
    }

    fn record(&self, _instance: &Value, _ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        evaluated.mark_all_properties();
    }
}

impl UnevaluatedItemsValidator {
    fn unexpected(&self, items: &[Value], ctx: &mut ValidationContext) -> Vec<usize> {
        let candidates = items
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.covered.covers(*idx));
        self.rule.rejected(candidates, ctx)
    }
}

impl Validate for UnevaluatedItemsValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        match instance {
            Value::Array(items) => self.unexpected(items, ctx).is_empty(),
            _ => true,
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        match instance {
            Value::Array(items) => {
                let unexpected = self.unexpected(items, ctx);
                self.rule.items_error(instance, location, &unexpected, items)
            }
            _ => Ok(()),
        }
    }

    fn record(&self, _instance: &Value, _ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        evaluated.mark_all_items();
    }
}

impl DynamicUnevaluated {
    /// Members evaluated by `validators`, all of which accept `instance`.
    fn evaluated(
        instance: &Value,
        validators: &[BoxedValidator],
        ctx: &mut ValidationContext,
    ) -> Evaluated {
        let mut evaluated = Evaluated::default();
        for validator in validators {
            validator.record(instance, ctx, &mut evaluated);
        }
        evaluated
    }

    pub(crate) fn is_valid(
        &self,
        instance: &Value,
        validators: &[BoxedValidator],
        ctx: &mut ValidationContext,
    ) -> bool {
        self.validate(instance, &LazyLocation::new(), validators, ctx).is_ok()
    }

    pub(crate) fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        validators: &[BoxedValidator],
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        match (instance, &self.properties, &self.items) {
            (Value::Object(map), Some(rule), _) => {
                let evaluated = Self::evaluated(instance, validators, ctx);
                let candidates = map
                    .iter()
                    .filter(|(name, _)| !evaluated.is_property_evaluated(name))
                    .map(|(name, value)| (name.clone(), value));
                let unexpected = rule.rejected(candidates, ctx);
                rule.properties_error(instance, location, unexpected)
            }
            (Value::Array(items), _, Some(rule)) => {
                let evaluated = Self::evaluated(instance, validators, ctx);
                let candidates = items
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !evaluated.is_item_evaluated(*idx));
                let unexpected = rule.rejected(candidates, ctx);
                rule.items_error(instance, location, &unexpected, items)
            }
            _ => Ok(()),
        }
    }

    /// The unevaluated keywords evaluate every member of their axis.
    pub(crate) fn record(&self, evaluated: &mut Evaluated) {
        if self.properties.is_some() {
            evaluated.mark_all_properties();
        }
        if self.items.is_some() {
            evaluated.mark_all_items();
        }
    }
}
