//! Fused `properties` / `patternProperties` / `additionalProperties`.
//!
//! The three keywords decide together which schema applies to a property, so they are compiled
//! into a single validator that walks the object once.
use std::sync::Arc;

use ahash::AHashMap;
use serde_json::{Map, Value};

use crate::{
    compiler::{self, required_names, CompileStop},
    error::{no_error, CompileError, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::{pattern, ApplicatorResult},
    node::SchemaNode,
    paths::{LazyLocation, Location},
    regex::CompiledRegex,
    template::{format, Arg, SafeCode},
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

/// Property maps up to this size are searched linearly.
const MAP_THRESHOLD: usize = 40;

/// The object keywords handled by the fused validator.
pub(crate) struct Keywords<'a> {
    pub(crate) properties: Option<&'a Value>,
    pub(crate) pattern_properties: Option<&'a Value>,
    pub(crate) additional_properties: Option<&'a Value>,
    /// Only used to tell which properties are known to exist.
    pub(crate) required: Option<&'a Value>,
}

pub(crate) enum PropertiesMap {
    Small(Vec<(String, SchemaNode)>),
    Big(AHashMap<String, SchemaNode>),
}

impl PropertiesMap {
    fn from_vec(nodes: Vec<(String, SchemaNode)>) -> PropertiesMap {
        if nodes.len() < MAP_THRESHOLD {
            PropertiesMap::Small(nodes)
        } else {
            PropertiesMap::Big(nodes.into_iter().collect())
        }
    }

    #[inline]
    fn get(&self, property: &str) -> Option<&SchemaNode> {
        match self {
            PropertiesMap::Small(nodes) => nodes
                .iter()
                .find(|(name, _)| name == property)
                .map(|(_, node)| node),
            PropertiesMap::Big(nodes) => nodes.get(property),
        }
    }
}

enum Additional {
    Absent,
    Schema(SchemaNode),
    /// `false`, with the keyword location.
    Forbidden(Location),
}

pub(crate) struct PropertiesValidator {
    properties: PropertiesMap,
    patterns: Vec<(Arc<CompiledRegex>, SchemaNode)>,
    additional: Additional,
    defaults: Vec<(String, Value)>,
    remove_unlisted: bool,
}

fn object<'a>(
    ctx: &compiler::Context,
    keyword: &str,
    value: &'a Value,
) -> Result<&'a Map<String, Value>, CompileError> {
    value.as_object().ok_or_else(|| {
        CompileError::invalid_keyword(ctx.location(), keyword, value, "expected an object")
    })
}

/// Listing condition that holds when `key` is neither one of `names` nor matched by `patterns`.
pub(crate) fn unlisted_condition(
    ctx: &compiler::Context,
    key: &SafeCode,
    names: &[String],
    patterns: &[SafeCode],
) -> Result<SafeCode, CompileError> {
    let mut terms = Vec::new();
    if !names.is_empty() {
        let listed = ctx.scope.constant(
            "properties",
            &Value::Array(names.iter().cloned().map(Value::String).collect()),
        )?;
        terms.push(format("!%s.includes(%s)", &[Arg::Code(&listed), Arg::Code(key)])?);
    }
    for pattern in patterns {
        terms.push(format("!%s.test(%s)", &[Arg::Code(pattern), Arg::Code(key)])?);
    }
    let mut terms = terms.into_iter();
    let Some(mut condition) = terms.next() else {
        return Ok(format("true", &[])?);
    };
    for term in terms {
        condition = format("%s && %s", &[Arg::Code(&condition), Arg::Code(&term)])?;
    }
    Ok(condition)
}

pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, keywords: Keywords<'a>) -> ApplicatorResult {
    let required = required_names(keywords.required);
    let trusted = ctx.options().assume_trusted_input;
    let mut nodes = Vec::new();
    let mut names = Vec::new();
    let mut defaults = Vec::new();
    if let Some(value) = keywords.properties {
        let map = object(ctx, "properties", value)?;
        let properties_ctx = ctx.new_at_location("properties");
        for (name, schema) in map {
            let present = trusted && required.contains(name.as_str());
            let child = properties_ctx.descend(name, ctx.property_data(name)?, present);
            let compiled = child.when_present(|| compiler::compile(&child, schema))?;
            if ctx.options().apply_defaults {
                if let Some(default) = schema.get("default") {
                    defaults.push((name.clone(), default.clone()));
                }
            }
            names.push(name.clone());
            nodes.push((name.clone(), compiled.node));
        }
    }
    let mut patterns = Vec::new();
    let mut pattern_names = Vec::new();
    let mut pattern_sources = Vec::new();
    let key = ctx.name("key")?;
    let item = ctx.item_data(&key)?;
    let open = format(
        "for (const %s of Object.keys(%s)) {",
        &[Arg::Code(&key), Arg::Code(ctx.data())],
    )?;
    let additional = ctx.block(&open, || -> Result<Additional, CompileStop> {
        if let Some(value) = keywords.pattern_properties {
            let map = object(ctx, "patternProperties", value)?;
            let patterns_ctx = ctx.new_at_location("patternProperties");
            for (source, schema) in map {
                let (name, regex) =
                    pattern::regex(ctx, source, patterns_ctx.location().join(source))?;
                let child = patterns_ctx.descend(source, item.clone(), true);
                let matched = format("if (%s.test(%s)) {", &[Arg::Code(&name), Arg::Code(&key)])?;
                let compiled = ctx.block(&matched, || compiler::compile(&child, schema))?;
                patterns.push((regex, compiled.node));
                pattern_names.push(name);
                pattern_sources.push(source.clone());
            }
        }
        Ok(match keywords.additional_properties {
            None => Additional::Absent,
            Some(Value::Bool(true)) => {
                Additional::Schema(SchemaNode::new(
                    Vec::new(),
                    ctx.keyword_location("additionalProperties"),
                ))
            }
            Some(Value::Bool(false)) => {
                ctx.forbid_conditional_removal("additionalProperties")?;
                let condition = unlisted_condition(ctx, &key, &names, &pattern_names)?;
                ctx.check(&condition, "additionalProperties")?;
                Additional::Forbidden(ctx.keyword_location("additionalProperties"))
            }
            Some(schema) => {
                let condition = unlisted_condition(ctx, &key, &names, &pattern_names)?;
                let child = ctx.descend("additionalProperties", item.clone(), true);
                let unlisted = format("if (%s) {", &[Arg::Code(&condition)])?;
                Additional::Schema(ctx.block(&unlisted, || compiler::compile(&child, schema))?.node)
            }
        })
    })?;
    let delta = match additional {
        Additional::Absent => {
            EvaluationDelta::properties(names).and(&EvaluationDelta::patterns(pattern_sources))
        }
        Additional::Schema(_) | Additional::Forbidden(_) => EvaluationDelta::all_properties(),
    };
    Ok((
        Box::new(PropertiesValidator {
            properties: PropertiesMap::from_vec(nodes),
            patterns,
            additional,
            defaults,
            remove_unlisted: ctx.options().remove_unlisted,
        }),
        delta,
    ))
}

impl PropertiesValidator {
    fn is_listed(&self, property: &str) -> bool {
        self.properties.get(property).is_some()
            || self
                .patterns
                .iter()
                .any(|(regex, _)| regex.is_match(property).unwrap_or(false))
    }

    fn unexpected(&self, map: &Map<String, Value>) -> Vec<String> {
        map.keys()
            .filter(|property| !self.is_listed(property))
            .cloned()
            .collect()
    }
}

impl Validate for PropertiesValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        let Value::Object(map) = instance else {
            return true;
        };
        for (property, value) in map {
            let mut listed = false;
            if let Some(node) = self.properties.get(property) {
                listed = true;
                if !node.is_valid(value, ctx) {
                    return false;
                }
            }
            for (regex, node) in &self.patterns {
                if regex.is_match(property).unwrap_or(false) {
                    listed = true;
                    if !node.is_valid(value, ctx) {
                        return false;
                    }
                }
            }
            if !listed {
                match &self.additional {
                    Additional::Absent => {}
                    Additional::Forbidden(_) => return false,
                    Additional::Schema(node) => {
                        if !node.is_valid(value, ctx) {
                            return false;
                        }
                    }
                }
            }
        }
        true
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
        for (property, value) in map {
            let property_location = location.push(property.as_str());
            let mut listed = false;
            if let Some(node) = self.properties.get(property) {
                listed = true;
                node.validate(value, &property_location, ctx)?;
            }
            for (regex, node) in &self.patterns {
                if regex.is_match(property).unwrap_or(false) {
                    listed = true;
                    node.validate(value, &property_location, ctx)?;
                }
            }
            if !listed {
                match &self.additional {
                    Additional::Absent => {}
                    Additional::Forbidden(keyword_location) => {
                        return Err(ValidationError::new(
                            keyword_location.clone(),
                            location.materialize(),
                            instance,
                            ValidationErrorKind::AdditionalProperties {
                                unexpected: self.unexpected(map),
                            },
                        ));
                    }
                    Additional::Schema(node) => node.validate(value, &property_location, ctx)?,
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
        let Value::Object(map) = instance else {
            return no_error();
        };
        let mut errors = Vec::new();
        let mut unexpected = Vec::new();
        for (property, value) in map {
            let property_location = location.push(property.as_str());
            let mut listed = false;
            if let Some(node) = self.properties.get(property) {
                listed = true;
                errors.extend(node.iter_errors(value, &property_location, ctx));
            }
            for (regex, node) in &self.patterns {
                if regex.is_match(property).unwrap_or(false) {
                    listed = true;
                    errors.extend(node.iter_errors(value, &property_location, ctx));
                }
            }
            if !listed {
                match &self.additional {
                    Additional::Absent => {}
                    Additional::Forbidden(_) => unexpected.push(property.clone()),
                    Additional::Schema(node) => {
                        errors.extend(node.iter_errors(value, &property_location, ctx));
                    }
                }
            }
        }
        if let (Additional::Forbidden(keyword_location), false) =
            (&self.additional, unexpected.is_empty())
        {
            errors.push(ValidationError::new(
                keyword_location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::AdditionalProperties { unexpected },
            ));
        }
        Box::new(errors.into_iter())
    }

    fn record(&self, instance: &Value, _ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        let Value::Object(map) = instance else {
            return;
        };
        if !matches!(self.additional, Additional::Absent) {
            evaluated.mark_all_properties();
            return;
        }
        for property in map.keys() {
            if self.is_listed(property) {
                evaluated.mark_property(property);
            }
        }
    }

    fn normalize(&self, instance: &mut Value, ctx: &mut ValidationContext) {
        let Value::Object(map) = instance else {
            return;
        };
        for (name, default) in &self.defaults {
            if !map.contains_key(name) {
                map.insert(name.clone(), default.clone());
            }
        }
        if self.remove_unlisted && matches!(self.additional, Additional::Forbidden(_)) {
            map.retain(|property, _| self.is_listed(property));
        }
        for (property, value) in map.iter_mut() {
            let mut listed = false;
            if let Some(node) = self.properties.get(property) {
                listed = true;
                node.normalize(value, ctx);
            }
            for (regex, node) in &self.patterns {
                if regex.is_match(property).unwrap_or(false) {
                    listed = true;
                    node.normalize(value, ctx);
                }
            }
            if let (false, Additional::Schema(node)) = (listed, &self.additional) {
                node.normalize(value, ctx);
            }
        }
    }
}
