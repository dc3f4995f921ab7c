//! The schema compiler.
//!
//! Every schema object becomes a [`SchemaNode`] holding one validator per keyword group, and
//! every reference target becomes a subroutine in the [`Scope`]. While walking the schema the
//! compiler writes a listing line for each check it builds and computes the static
//! [`EvaluationDelta`] of every node.
//!
//! Compilation first runs without runtime tracking of evaluated members. If an
//! `unevaluatedProperties` / `unevaluatedItems` keyword can not be resolved statically, the
//! attempt stops with [`CompileStop::NeedsDynamic`] and [`build`] starts over with tracking
//! enabled.
use std::{cell::RefCell, collections::BTreeSet};

use ahash::AHashSet;
use jsonsafe_referencing::{join_path, pointer_to, resolve, split_fragment, Draft};
use serde_json::{Map, Value};

use crate::{
    error::CompileError,
    keywords::{self, unevaluated::Unevaluated, BoxedValidator},
    lines::Lines,
    node::{ResourceEntry, SchemaNode},
    options::ValidationOptions,
    paths::{Location, LocationSegment},
    regex::pattern_matches,
    scope::Scope,
    template::{format, Arg, SafeCode, TemplateError},
    tracer::EvaluationDelta,
    types::{JsonType, JsonTypeSet},
    validator::Validator,
};

/// Why a compilation attempt stopped.
#[derive(Debug)]
pub(crate) enum CompileStop {
    Failed(CompileError),
    /// Static evaluation tracing is not enough for this schema.
    NeedsDynamic,
}

impl From<CompileError> for CompileStop {
    fn from(error: CompileError) -> Self {
        CompileStop::Failed(error)
    }
}

impl From<TemplateError> for CompileStop {
    fn from(error: TemplateError) -> Self {
        CompileStop::Failed(CompileError::Template(error))
    }
}

/// A compiled node with its static evaluation delta.
pub(crate) struct Compiled {
    pub(crate) node: SchemaNode,
    pub(crate) delta: EvaluationDelta,
}

/// A subschema to compile as a subroutine.
pub(crate) struct Target<'a> {
    pub(crate) value: &'a Value,
    /// The document owning `value`.
    pub(crate) root: &'a Value,
    pub(crate) base: String,
    pub(crate) draft: Draft,
    pub(crate) location: Location,
    /// The schema resource enclosing `value`, for `$dynamicAnchor` scoping.
    pub(crate) resource: Option<&'a Value>,
}

/// Compilation state of a single schema node.
pub(crate) struct Context<'a> {
    pub(crate) scope: &'a Scope<'a>,
    root: &'a Value,
    base: String,
    pub(crate) draft: Draft,
    location: Location,
    lines: &'a RefCell<Lines>,
    data: SafeCode,
    present: bool,
    conditional: bool,
    enclosing_properties: bool,
    enclosing_items: bool,
    /// The subroutine whose top-level schema this context compiles.
    subroutine: Option<usize>,
    /// The subroutine this context is compiled into.
    caller: usize,
    /// Whether the validated value is a member of the instance `caller` received.
    descended: bool,
}

/// Collect what `body` writes and emit it as the content of a block in `lines`.
fn in_block<T, E>(
    lines: &RefCell<Lines>,
    open: &SafeCode,
    close: &SafeCode,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<TemplateError>,
{
    let outer = lines.replace(Lines::new());
    let result = body();
    let inner = lines.replace(outer);
    let value = result?;
    lines.borrow_mut().block(open, close, |block| {
        block.extend(&inner);
        Ok::<_, E>(())
    })?;
    Ok(value)
}

impl<'a> Context<'a> {
    fn derive(&self) -> Context<'a> {
        Context {
            scope: self.scope,
            root: self.root,
            base: self.base.clone(),
            draft: self.draft,
            location: self.location.clone(),
            lines: self.lines,
            data: self.data.clone(),
            present: self.present,
            conditional: self.conditional,
            enclosing_properties: self.enclosing_properties,
            enclosing_items: self.enclosing_items,
            subroutine: self.subroutine,
            caller: self.caller,
            descended: self.descended,
        }
    }

    pub(crate) fn options(&self) -> &'a ValidationOptions {
        self.scope.options
    }

    pub(crate) fn location(&self) -> &Location {
        &self.location
    }

    pub(crate) fn keyword_location<'s>(&self, keyword: impl Into<LocationSegment<'s>>) -> Location {
        self.location.join(keyword)
    }

    /// Listing expression of the validated value.
    pub(crate) fn data(&self) -> &SafeCode {
        &self.data
    }

    pub(crate) fn enclosing_properties(&self) -> bool {
        self.enclosing_properties
    }

    pub(crate) fn enclosing_items(&self) -> bool {
        self.enclosing_items
    }

    /// Record a call to the subroutine `callee` made under `keyword`.
    ///
    /// A cycle of calls that never moves to a member of the instance can not terminate.
    pub(crate) fn record_call(&self, callee: usize, keyword: &str) -> Result<(), CompileError> {
        if !self.descended && self.scope.add_call(self.caller, callee) {
            return Err(CompileError::CyclicReference {
                location: self.keyword_location(keyword),
            });
        }
        Ok(())
    }

    /// Reject `removeUnlisted` for members that are only rejected conditionally.
    pub(crate) fn forbid_conditional_removal(&self, keyword: &str) -> Result<(), CompileError> {
        if self.conditional && self.options().remove_unlisted {
            return Err(CompileError::UnsupportedOption {
                location: self.keyword_location(keyword),
                message: "unlisted members can not be removed inside a conditional subschema",
            });
        }
        Ok(())
    }

    /// A context for a subschema applied to the same value.
    #[must_use]
    pub(crate) fn new_at_location<'s>(
        &self,
        segment: impl Into<LocationSegment<'s>>,
    ) -> Context<'a> {
        let mut ctx = self.derive();
        ctx.location = self.location.join(segment);
        ctx.subroutine = None;
        ctx
    }

    /// Mark the context as conditional: its outcome does not decide the outcome of the parent.
    #[must_use]
    pub(crate) fn as_conditional(mut self) -> Context<'a> {
        self.conditional = true;
        self
    }

    /// A context for a subschema applied to a member of the validated value.
    #[must_use]
    pub(crate) fn descend<'s>(
        &self,
        segment: impl Into<LocationSegment<'s>>,
        data: SafeCode,
        present: bool,
    ) -> Context<'a> {
        let mut ctx = self.new_at_location(segment);
        ctx.data = data;
        ctx.descended = true;
        ctx.present = present;
        ctx.enclosing_properties = false;
        ctx.enclosing_items = false;
        ctx
    }

    /// Listing expression for the property `name` of the validated value.
    pub(crate) fn property_data(&self, name: &str) -> Result<SafeCode, TemplateError> {
        let name = Value::String(name.to_string());
        format("%s[%j]", &[Arg::Code(&self.data), Arg::Literal(Some(&name))])
    }

    /// Listing expression for the item at `index` of the validated value.
    pub(crate) fn item_data(&self, index: &SafeCode) -> Result<SafeCode, TemplateError> {
        format("%s[%s]", &[Arg::Code(&self.data), Arg::Code(index)])
    }

    pub(crate) fn write(&self, line: &SafeCode) -> Result<(), TemplateError> {
        self.lines.borrow_mut().write(line)
    }

    /// Write the lines of `body` inside a block opened by `open`. A block left empty is dropped.
    pub(crate) fn block<T, E>(
        &self,
        open: &SafeCode,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<TemplateError>,
    {
        in_block(self.lines, open, &format("}", &[])?, body)
    }

    /// Run `body` under a presence guard unless the value is known to exist.
    pub(crate) fn when_present<T, E>(&self, body: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<TemplateError>,
    {
        if self.present {
            body()
        } else {
            self.block(&format("if (%s !== undefined) {", &[Arg::Code(&self.data)])?, body)
        }
    }

    /// Write a failing check for `keyword`: when `condition` holds, validation fails.
    pub(crate) fn check(&self, condition: &SafeCode, keyword: &str) -> Result<(), TemplateError> {
        self.check_at(condition, &self.keyword_location(keyword))
    }

    /// Same as [`Context::check`], reported at an arbitrary schema location.
    pub(crate) fn check_at(
        &self,
        condition: &SafeCode,
        location: &Location,
    ) -> Result<(), TemplateError> {
        let location = Value::String(location.as_str().to_string());
        let line = if self.options().collect_all_errors {
            format(
                "if (%s) error(%j)",
                &[Arg::Code(condition), Arg::Literal(Some(&location))],
            )?
        } else {
            format(
                "if (%s) return fail(%j)",
                &[Arg::Code(condition), Arg::Literal(Some(&location))],
            )?
        };
        self.write(&line)
    }

    /// Write the checks of `body` into an inline function and bind its outcome to a fresh
    /// identifier, for applicators that inspect whether a subschema passed.
    pub(crate) fn subcheck<T>(
        &self,
        body: impl FnOnce() -> Result<T, CompileStop>,
    ) -> Result<(SafeCode, T), CompileStop> {
        let ok = self.name("ok")?;
        let open = format("const %s = (() => {", &[Arg::Code(&ok)])?;
        let result = in_block(self.lines, &open, &format("})()", &[])?, || {
            let result = body()?;
            self.write(&format("return true", &[])?)?;
            Ok::<_, CompileStop>(result)
        })?;
        Ok((ok, result))
    }

    /// Resolve `reference` found under `keyword` of the current node.
    pub(crate) fn resolve(
        &self,
        reference: &str,
        keyword: &str,
    ) -> Result<Target<'a>, CompileError> {
        let documents = self.scope.documents();
        let lookup = |root: &'a Value| {
            resolve(root, documents, reference, &self.base, self.draft).map_err(|source| {
                CompileError::Reference {
                    location: self.keyword_location(keyword),
                    source,
                }
            })
        };
        let mut found = lookup(self.root)?;
        if found.is_empty() && !std::ptr::eq(self.root, self.scope.root) {
            found = lookup(self.scope.root)?;
        }
        tracing::trace!(
            reference,
            base = self.base.as_str(),
            matches = found.len(),
            "Resolved reference"
        );
        let Some(resolved) = found.into_iter().next() else {
            return Err(CompileError::UnresolvableReference {
                reference: reference.to_string(),
                location: self.keyword_location(keyword),
            });
        };
        let location = if std::ptr::eq(resolved.root, self.scope.root) {
            pointer_to(resolved.root, resolved.target).map(Location::from_encoded)
        } else {
            None
        }
        .unwrap_or_else(|| Location::from_encoded(resolved.path.clone()));
        let resource = if resolved.draft == Draft::Draft202012 {
            let (resource_uri, _) = split_fragment(&resolved.path);
            if resource_uri.is_empty() {
                Some(resolved.root)
            } else {
                resolve(resolved.root, documents, resource_uri, "", resolved.draft)
                    .ok()
                    .and_then(|found| found.into_iter().next())
                    .map(|resource| resource.target)
            }
        } else {
            None
        };
        Ok(Target {
            value: resolved.target,
            root: resolved.root,
            base: resolved.path,
            draft: resolved.draft,
            location,
            resource,
        })
    }

    /// Fresh listing identifier.
    pub(crate) fn name(&self, prefix: &'static str) -> Result<SafeCode, TemplateError> {
        self.scope.name(prefix)
    }
}

/// Compile `schema` into a validator, retrying with dynamic tracing when needed.
pub(crate) fn build(
    options: &ValidationOptions,
    schema: &Value,
) -> Result<Validator, CompileError> {
    tracing::debug!(mode = ?options.mode, "Compiling schema");
    match attempt(options, schema, false) {
        Ok(validator) => Ok(validator),
        Err(CompileStop::Failed(error)) => Err(error),
        Err(CompileStop::NeedsDynamic) => {
            tracing::debug!(
                "Static evaluation tracing is insufficient, recompiling with dynamic tracing"
            );
            match attempt(options, schema, true) {
                Ok(validator) => Ok(validator),
                Err(CompileStop::Failed(error)) => Err(error),
                Err(CompileStop::NeedsDynamic) => Err(CompileError::Internal(
                    "dynamic tracing requested while it is enabled",
                )),
            }
        }
    }
}

fn attempt(
    options: &ValidationOptions,
    schema: &Value,
    dynamic: bool,
) -> Result<Validator, CompileStop> {
    let draft = Draft::detect(schema)
        .map_err(|error| {
            CompileError::invalid_keyword(
                &Location::new(),
                "$schema",
                schema.get("$schema").unwrap_or(&Value::Null),
                error.to_string(),
            )
        })?
        .unwrap_or(options.default_schema_version);
    if options.mode.is_strict() {
        let mut documents: Vec<_> = options.additional_schemas.iter().collect();
        documents.sort_unstable_by(|left, right| left.0.cmp(right.0));
        for (id, document) in documents {
            if document.get("$schema").is_none() {
                return Err(CompileError::strict(
                    &Location::from_encoded(id.clone()),
                    "'$schema' is required in every document",
                )
                .into());
            }
        }
    }
    let scope = Scope::new(options, schema, dynamic);
    let target = Target {
        value: schema,
        root: schema,
        base: String::new(),
        draft,
        location: Location::new(),
        resource: None,
    };
    compile_subroutine(&scope, &target, false, false)?;
    Ok(scope.into_validator(draft)?)
}

/// Compile `target` once per scope and return its subroutine index and delta.
///
/// The subroutine slot is reserved before the target is compiled, so references back to it
/// resolve to the same index and get an unknown delta.
pub(crate) fn compile_subroutine<'a>(
    scope: &'a Scope<'a>,
    target: &Target<'a>,
    enclosing_properties: bool,
    enclosing_items: bool,
) -> Result<(usize, EvaluationDelta), CompileStop> {
    let key = (
        std::ptr::from_ref(target.value) as usize,
        enclosing_properties,
        enclosing_items,
    );
    if let Some(idx) = scope.lookup(key) {
        return Ok((idx, scope.delta_of(idx)));
    }
    let idx = scope.reserve(key)?;
    tracing::debug!(subroutine = idx, location = %target.location, "Compiling subroutine");
    let lines = RefCell::new(Lines::new());
    let ctx = Context {
        scope,
        root: target.root,
        base: target.base.clone(),
        draft: target.draft,
        location: target.location.clone(),
        lines: &lines,
        data: SafeCode::identifier("data")?,
        present: true,
        conditional: false,
        enclosing_properties,
        enclosing_items,
        subroutine: Some(idx),
        caller: idx,
        descended: false,
    };
    let Compiled { mut node, delta } = compile_node(&ctx, target.value)?;
    if let Some(resource) = target.resource {
        if !std::ptr::eq(resource, target.value) {
            let (resource_base, _) = split_fragment(&target.base);
            if let Some(anchors) = dynamic_anchors(&ctx, resource, resource_base)? {
                node.inherit_dynamic_anchors(anchors);
            }
        }
    }
    drop(ctx);
    scope.finish(idx, node, delta.clone(), lines.into_inner());
    Ok((idx, delta))
}

/// Scan a 2020-12 resource for `$dynamicAnchor`s and compile each of them as a subroutine.
fn dynamic_anchors<'a>(
    ctx: &Context<'a>,
    resource: &'a Value,
    base: &str,
) -> Result<Option<usize>, CompileStop> {
    if ctx.draft != Draft::Draft202012 {
        return Ok(None);
    }
    let key = std::ptr::from_ref(resource) as usize;
    if let Some(known) = ctx.scope.resource_anchors(key) {
        return Ok(known);
    }
    let mut found = Vec::new();
    collect_dynamic_anchors(resource, ctx.draft, true, &mut found);
    if found.is_empty() {
        ctx.scope.skip_anchors(key);
        return Ok(None);
    }
    let idx = ctx.scope.reserve_anchors(key);
    let mut table = Vec::with_capacity(found.len());
    for (name, value) in found {
        let pointer = pointer_to(ctx.root, value).unwrap_or_default();
        let location = if std::ptr::eq(ctx.root, ctx.scope.root) {
            Location::from_encoded(pointer)
        } else {
            Location::from_encoded(format!("{base}#{pointer}"))
        };
        let target = Target {
            value,
            root: ctx.root,
            base: base.to_string(),
            draft: ctx.draft,
            location,
            resource: Some(resource),
        };
        let (subroutine, _) = compile_subroutine(ctx.scope, &target, false, false)?;
        table.push((name.to_string(), subroutine));
    }
    ctx.scope.set_anchors(idx, table);
    Ok(Some(idx))
}

fn collect_dynamic_anchors<'v>(
    value: &'v Value,
    draft: Draft,
    top: bool,
    found: &mut Vec<(&'v str, &'v Value)>,
) {
    match value {
        Value::Object(map) => {
            if !top && map.contains_key("$id") {
                return;
            }
            if let Some(Value::String(anchor)) = map.get("$dynamicAnchor") {
                found.push((anchor, value));
            }
            for (key, child) in map {
                match key.as_str() {
                    "const" | "default" | "enum" | "examples" => {}
                    "$defs"
                    | "definitions"
                    | "dependentSchemas"
                    | "patternProperties"
                    | "properties" => {
                        if let Value::Object(children) = child {
                            for child in children.values() {
                                collect_dynamic_anchors(child, draft, false, found);
                            }
                        }
                    }
                    key if draft.is_known_keyword(key) => {
                        collect_dynamic_anchors(child, draft, false, found);
                    }
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_dynamic_anchors(item, draft, false, found);
            }
        }
        _ => {}
    }
}

/// Compile a subschema.
///
/// Nodes that can be the target of `$recursiveRef` / `$dynamicRef` are compiled as subroutines,
/// so the runtime can find them by index.
pub(crate) fn compile<'a>(ctx: &Context<'a>, schema: &'a Value) -> Result<Compiled, CompileStop> {
    if let Value::Object(map) = schema {
        let draft = Draft::detect(schema).ok().flatten().unwrap_or(ctx.draft);
        let anchored = match draft {
            Draft::Draft201909 => map.get("$recursiveAnchor") == Some(&Value::Bool(true)),
            Draft::Draft202012 => map.contains_key("$dynamicAnchor"),
            _ => false,
        };
        if anchored {
            let target = Target {
                value: schema,
                root: ctx.root,
                base: ctx.base.clone(),
                draft: ctx.draft,
                location: ctx.location.clone(),
                resource: None,
            };
            let (idx, delta) = compile_subroutine(
                ctx.scope,
                &target,
                ctx.enclosing_properties,
                ctx.enclosing_items,
            )?;
            let keyword = if draft == Draft::Draft201909 {
                "$recursiveAnchor"
            } else {
                "$dynamicAnchor"
            };
            ctx.record_call(idx, keyword)?;
            let validator =
                keywords::ref_::RefValidator::to_subroutine(ctx, idx, ctx.location.clone())?;
            return Ok(Compiled {
                node: SchemaNode::new(vec![validator], ctx.location.clone()),
                delta,
            });
        }
    }
    compile_node(ctx, schema)
}

fn compile_node<'a>(ctx: &Context<'a>, schema: &'a Value) -> Result<Compiled, CompileStop> {
    match schema {
        Value::Bool(value) => {
            if ctx.draft == Draft::Draft4 {
                return Err(
                    CompileError::invalid_schema(ctx.location.clone(), "an object", schema).into(),
                );
            }
            if *value {
                Ok(Compiled {
                    node: SchemaNode::new(Vec::new(), ctx.location.clone()),
                    delta: EvaluationDelta::neutral(),
                })
            } else {
                let validator = keywords::boolean::FalseValidator::compile(ctx)?;
                Ok(Compiled {
                    node: SchemaNode::new(vec![validator], ctx.location.clone()),
                    delta: EvaluationDelta::impossible(),
                })
            }
        }
        Value::Object(map) => NodeCompiler::new(ctx, schema, map)?.compile(),
        _ => Err(CompileError::invalid_schema(
            ctx.location.clone(),
            "an object or a boolean",
            schema,
        )
        .into()),
    }
}

const ANNOTATIONS: &[&str] = &[
    "$comment",
    "$vocabulary",
    "title",
    "description",
    "examples",
    "readOnly",
    "writeOnly",
    "deprecated",
];

const NUMBER_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

const STRING_KEYWORDS: &[&str] = &[
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "contentEncoding",
    "contentMediaType",
    "contentSchema",
];

const ARRAY_KEYWORDS: &[&str] = &[
    "items",
    "prefixItems",
    "additionalItems",
    "contains",
    "minItems",
    "maxItems",
    "uniqueItems",
];

const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "additionalProperties",
    "required",
    "dependencies",
    "dependentRequired",
    "dependentSchemas",
    "propertyNames",
    "minProperties",
    "maxProperties",
];

/// Keywords that only annotate and are allowed next to `$ref` in strict mode.
fn is_annotation(keyword: &str) -> bool {
    ANNOTATIONS.contains(&keyword)
        || matches!(
            keyword,
            "$schema" | "$id" | "id" | "$defs" | "definitions" | "default"
        )
}

fn unprocessed_reason(keyword: &str) -> &'static str {
    match keyword {
        "then" | "else" => "requires 'if' on the same schema",
        "additionalItems" => "has no effect unless 'items' is an array",
        "minContains" | "maxContains" => "requires 'contains' on the same schema",
        "exclusiveMinimum" => "requires 'minimum' on the same schema",
        "exclusiveMaximum" => "requires 'maximum' on the same schema",
        _ => "has no effect here",
    }
}

/// Whether keywords of the `family` type can apply to a value of one of `types`.
fn applies(types: JsonTypeSet, family: JsonType) -> bool {
    match family {
        JsonType::Number => types.contains(JsonType::Number) || types.contains(JsonType::Integer),
        family => types.contains(family),
    }
}

struct NodeCompiler<'a> {
    ctx: Context<'a>,
    schema: &'a Value,
    map: &'a Map<String, Value>,
    consumed: AHashSet<&'a str>,
    validators: Vec<BoxedValidator>,
    delta: EvaluationDelta,
    types: Option<JsonTypeSet>,
    entry: ResourceEntry,
}

impl<'a> NodeCompiler<'a> {
    fn new(
        parent: &Context<'a>,
        schema: &'a Value,
        map: &'a Map<String, Value>,
    ) -> Result<Self, CompileStop> {
        let mut consumed = AHashSet::new();
        let draft = match map.get_key_value("$schema") {
            Some((key, value)) => {
                consumed.insert(key.as_str());
                Draft::detect(schema)
                    .map_err(|error| {
                        CompileError::invalid_keyword(
                            &parent.location,
                            "$schema",
                            value,
                            error.to_string(),
                        )
                    })?
                    .unwrap_or(parent.draft)
            }
            None => parent.draft,
        };
        if std::ptr::eq(schema, parent.root)
            && parent.options().mode.is_strict()
            && !map.contains_key("$schema")
        {
            return Err(CompileError::strict(
                &parent.location,
                "'$schema' is required at the document root",
            )
            .into());
        }
        let mut ctx = parent.derive();
        ctx.draft = draft;
        if let Some((key, id)) = map.get_key_value(draft.id_keyword()) {
            consumed.insert(key.as_str());
            let Some(id) = id.as_str() else {
                return Err(
                    CompileError::invalid_keyword(&parent.location, key, id, "expected a string")
                        .into(),
                );
            };
            if !(draft.exclusive_ref() && map.contains_key("$ref")) {
                ctx.base = join_path(&ctx.base, id);
            }
        }
        if draft >= Draft::Draft201909 {
            ctx.enclosing_properties |= map.contains_key("unevaluatedProperties");
            ctx.enclosing_items |= map.contains_key("unevaluatedItems");
        }
        Ok(NodeCompiler {
            ctx,
            schema,
            map,
            consumed,
            validators: Vec::new(),
            delta: EvaluationDelta::neutral(),
            types: None,
            entry: ResourceEntry::default(),
        })
    }

    /// The value of a keyword known to the current dialect, marking it as consumed.
    fn take(&mut self, keyword: &str) -> Option<&'a Value> {
        if !self.ctx.draft.is_known_keyword(keyword) {
            return None;
        }
        let (key, value) = self.map.get_key_value(keyword)?;
        self.consumed.insert(key.as_str());
        Some(value)
    }

    fn peek(&self, keyword: &str) -> Option<&'a Value> {
        if self.ctx.draft.is_known_keyword(keyword) {
            self.map.get(keyword)
        } else {
            None
        }
    }

    fn push(&mut self, validator: BoxedValidator) {
        self.validators.push(validator);
    }

    fn extend(&mut self, validators: Vec<BoxedValidator>) {
        self.validators.extend(validators);
    }

    fn apply(&mut self, (validator, delta): (BoxedValidator, EvaluationDelta)) {
        self.validators.push(validator);
        self.delta.apply(&delta);
    }

    fn compile(mut self) -> Result<Compiled, CompileStop> {
        self.anchors()?;
        if let Some(reference) = self.take("$ref") {
            let applied = keywords::ref_::compile(&self.ctx, reference)?;
            if self.ctx.draft.exclusive_ref() {
                return self.finish_exclusive_ref(applied);
            }
            self.apply(applied);
        }
        if let Some(reference) = self.take("$recursiveRef") {
            let applied = keywords::ref_::compile_recursive(&self.ctx, reference)?;
            self.apply(applied);
        }
        if let Some(reference) = self.take("$dynamicRef") {
            let applied = keywords::ref_::compile_dynamic(&self.ctx, reference)?;
            self.apply(applied);
        }
        self.annotations()?;
        self.default()?;
        self.types()?;
        self.numeric()?;
        self.string()?;
        self.array()?;
        self.object()?;
        self.generic()?;
        self.finish()
    }

    fn anchors(&mut self) -> Result<(), CompileStop> {
        for keyword in ["$anchor", "$dynamicAnchor"] {
            if let Some(value) = self.take(keyword) {
                if !value.is_string() {
                    return Err(CompileError::invalid_keyword(
                        &self.ctx.location,
                        keyword,
                        value,
                        "expected a string",
                    )
                    .into());
                }
            }
        }
        if let Some(value) = self.take("$recursiveAnchor") {
            match value {
                Value::Bool(true) => self.entry.recursive_anchor = self.ctx.subroutine,
                Value::Bool(false) => {}
                _ => {
                    return Err(CompileError::invalid_keyword(
                        &self.ctx.location,
                        "$recursiveAnchor",
                        value,
                        "expected a boolean",
                    )
                    .into())
                }
            }
        }
        let is_resource = std::ptr::eq(self.schema, self.ctx.root)
            || self.map.contains_key(self.ctx.draft.id_keyword());
        if is_resource {
            let base = split_fragment(&self.ctx.base).0.to_string();
            self.entry.dynamic_anchors = dynamic_anchors(&self.ctx, self.schema, &base)?;
        }
        Ok(())
    }

    fn finish_exclusive_ref(
        mut self,
        applied: (BoxedValidator, EvaluationDelta),
    ) -> Result<Compiled, CompileStop> {
        if self.ctx.options().mode.is_strict() {
            for key in self.map.keys() {
                if !self.consumed.contains(key.as_str()) && !is_annotation(key) {
                    return Err(CompileError::strict(
                        &self.ctx.keyword_location(key),
                        "keywords next to '$ref' are ignored in this dialect",
                    )
                    .into());
                }
            }
        }
        self.apply(applied);
        Ok(self.into_compiled(None))
    }

    fn annotations(&mut self) -> Result<(), CompileStop> {
        for keyword in ANNOTATIONS {
            self.take(keyword);
        }
        for keyword in ["$defs", "definitions"] {
            if let Some(value) = self.take(keyword) {
                if !value.is_object() {
                    return Err(CompileError::invalid_keyword(
                        &self.ctx.location,
                        keyword,
                        value,
                        "expected an object",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn default(&mut self) -> Result<(), CompileStop> {
        if self.take("default").is_some()
            && self.ctx.conditional
            && self.ctx.options().apply_defaults
        {
            return Err(CompileError::UnsupportedOption {
                location: self.ctx.keyword_location("default"),
                message: "'default' inside a conditional subschema can not be applied",
            }
            .into());
        }
        Ok(())
    }

    fn types(&mut self) -> Result<(), CompileStop> {
        if let Some(value) = self.take("type") {
            let types = keywords::type_::parse(&self.ctx, value)?;
            self.types = Some(types);
            let validator = keywords::type_::compile(&self.ctx, types)?;
            self.push(validator);
        }
        Ok(())
    }

    /// Check that keywords of a type family fit the declared `type` and build the guard line
    /// applying them to values of that type only. `None` if none of the keywords is present.
    fn family(
        &self,
        family: JsonType,
        keywords: &[&str],
    ) -> Result<Option<Option<SafeCode>>, CompileStop> {
        let Some(keyword) = keywords.iter().find(|keyword| self.peek(keyword).is_some()) else {
            return Ok(None);
        };
        if let Some(types) = self.types {
            if !applies(types, family) {
                if !self.ctx.options().mode.is_permissive() {
                    return Err(CompileError::TypeMismatch {
                        keyword: (*keyword).to_string(),
                        types: types.to_string(),
                        location: self.ctx.keyword_location(*keyword),
                    }
                    .into());
                }
            } else if types
                .iter()
                .all(|ty| ty == family || (family == JsonType::Number && ty == JsonType::Integer))
            {
                return Ok(Some(None));
            }
        }
        let guard = keywords::type_::guard(family, &self.ctx.data)?;
        Ok(Some(Some(format("if (%s) {", &[Arg::Code(&guard)])?)))
    }

    /// Compile the keywords of one type family, inside its guard block if there is one.
    fn guarded(
        &mut self,
        family: JsonType,
        keywords: &[&str],
        body: fn(&mut Self) -> Result<(), CompileStop>,
    ) -> Result<(), CompileStop> {
        match self.family(family, keywords)? {
            None => Ok(()),
            Some(None) => body(self),
            Some(Some(open)) => {
                let lines = self.ctx.lines;
                in_block(lines, &open, &format("}", &[])?, || body(self))
            }
        }
    }

    fn numeric(&mut self) -> Result<(), CompileStop> {
        self.guarded(JsonType::Number, NUMBER_KEYWORDS, Self::numeric_keywords)
    }

    fn string(&mut self) -> Result<(), CompileStop> {
        self.guarded(JsonType::String, STRING_KEYWORDS, Self::string_keywords)
    }

    fn array(&mut self) -> Result<(), CompileStop> {
        self.guarded(JsonType::Array, ARRAY_KEYWORDS, Self::array_keywords)
    }

    fn object(&mut self) -> Result<(), CompileStop> {
        self.guarded(JsonType::Object, OBJECT_KEYWORDS, Self::object_keywords)
    }

    fn numeric_keywords(&mut self) -> Result<(), CompileStop> {
        let minimum = self.take("minimum");
        let maximum = self.take("maximum");
        let legacy = self.ctx.draft == Draft::Draft4;
        let exclusive_minimum = if legacy && minimum.is_none() {
            None
        } else {
            self.take("exclusiveMinimum")
        };
        let exclusive_maximum = if legacy && maximum.is_none() {
            None
        } else {
            self.take("exclusiveMaximum")
        };
        let limits = keywords::minmax::compile(
            &self.ctx,
            keywords::minmax::Bounds {
                minimum,
                maximum,
                exclusive_minimum,
                exclusive_maximum,
            },
        )?;
        self.extend(limits);
        if let Some(value) = self.take("multipleOf") {
            let validator = keywords::multiple_of::compile(&self.ctx, value)?;
            self.push(validator);
        }
        Ok(())
    }

    fn string_keywords(&mut self) -> Result<(), CompileStop> {
        let min_length = self.take("minLength");
        let max_length = self.take("maxLength");
        let lengths = keywords::string_length::compile(&self.ctx, min_length, max_length)?;
        self.extend(lengths);
        if let Some(pattern) = self.take("pattern") {
            let validator = keywords::pattern::compile(&self.ctx, pattern)?;
            self.push(validator);
        }
        if let Some(format) = self.take("format") {
            if let Some(validator) = keywords::format::compile(&self.ctx, format)? {
                self.push(validator);
            }
        }
        let encoding = self.take("contentEncoding");
        let media_type = self.take("contentMediaType");
        let content_schema = self.take("contentSchema");
        if let Some(validator) =
            keywords::content::compile(&self.ctx, encoding, media_type, content_schema)?
        {
            self.push(validator);
        }
        Ok(())
    }

    fn array_keywords(&mut self) -> Result<(), CompileStop> {
        let (prefix, rest) = if self.ctx.draft >= Draft::Draft202012 {
            let prefix = self.take("prefixItems").map(|value| ("prefixItems", value));
            let rest = self.take("items").map(|value| ("items", value));
            (prefix, rest)
        } else {
            match self.peek("items") {
                Some(Value::Array(_)) => {
                    let prefix = self.take("items").map(|value| ("items", value));
                    let rest = self.take("additionalItems").map(|value| ("additionalItems", value));
                    (prefix, rest)
                }
                Some(_) => (None, self.take("items").map(|value| ("items", value))),
                None => (None, None),
            }
        };
        if prefix.is_some() || rest.is_some() {
            let applied = keywords::items::compile(&self.ctx, prefix, rest)?;
            self.apply(applied);
        }
        if let Some(contains) = self.take("contains") {
            let min_contains = self.take("minContains");
            let max_contains = self.take("maxContains");
            let applied =
                keywords::contains::compile(&self.ctx, contains, min_contains, max_contains)?;
            self.apply(applied);
        }
        let min_items = self.take("minItems");
        let max_items = self.take("maxItems");
        let lengths = keywords::array_length::compile(&self.ctx, min_items, max_items)?;
        self.extend(lengths);
        if let Some(value) = self.take("uniqueItems") {
            if let Some(validator) = keywords::unique_items::compile(&self.ctx, value)? {
                self.push(validator);
            }
        }
        Ok(())
    }

    fn object_keywords(&mut self) -> Result<(), CompileStop> {
        let required = self.take("required");
        let properties = self.take("properties");
        let pattern_properties = self.take("patternProperties");
        let additional_properties = self.take("additionalProperties");
        if properties.is_some() || pattern_properties.is_some() || additional_properties.is_some() {
            let applied = keywords::properties::compile(
                &self.ctx,
                keywords::properties::Keywords {
                    properties,
                    pattern_properties,
                    additional_properties,
                    required,
                },
            )?;
            self.apply(applied);
        }
        if let Some(required) = required {
            if let Some(validator) = keywords::required::compile(&self.ctx, required)? {
                self.push(validator);
            }
        }
        if let Some(value) = self.take("dependencies") {
            let applied = keywords::dependencies::compile_dependencies(&self.ctx, value)?;
            self.apply(applied);
        }
        if let Some(value) = self.take("dependentRequired") {
            let validator = keywords::dependencies::compile_dependent_required(&self.ctx, value)?;
            self.push(validator);
        }
        if let Some(value) = self.take("dependentSchemas") {
            let applied = keywords::dependencies::compile_dependent_schemas(&self.ctx, value)?;
            self.apply(applied);
        }
        if let Some(value) = self.take("propertyNames") {
            let validator = keywords::property_names::compile(&self.ctx, value)?;
            self.push(validator);
        }
        let min_properties = self.take("minProperties");
        let max_properties = self.take("maxProperties");
        let sizes = keywords::object_size::compile(&self.ctx, min_properties, max_properties)?;
        self.extend(sizes);
        Ok(())
    }

    fn generic(&mut self) -> Result<(), CompileStop> {
        if let Some(value) = self.take("const") {
            let validator = keywords::const_::compile(&self.ctx, value)?;
            self.push(validator);
        }
        if let Some(value) = self.take("enum") {
            let validator = keywords::enum_::compile(&self.ctx, value)?;
            self.push(validator);
        }
        if let Some(value) = self.take("not") {
            let validator = keywords::not::compile(&self.ctx, value)?;
            self.push(validator);
        }
        if let Some(value) = self.take("if") {
            let then_schema = self.take("then");
            let else_schema = self.take("else");
            let applied = keywords::if_::compile(&self.ctx, value, then_schema, else_schema)?;
            self.apply(applied);
        }
        if let Some(value) = self.take("allOf") {
            let applied = keywords::all_of::compile(&self.ctx, value)?;
            self.apply(applied);
        }
        if let Some(value) = self.take("anyOf") {
            let applied = keywords::any_of::compile(&self.ctx, value)?;
            self.apply(applied);
        }
        if let Some(value) = self.take("oneOf") {
            let applied = keywords::one_of::compile(&self.ctx, value)?;
            self.apply(applied);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Compiled, CompileStop> {
        let properties = self.take("unevaluatedProperties");
        let items = self.take("unevaluatedItems");
        let mut dynamic = None;
        if properties.is_some() || items.is_some() {
            match keywords::unevaluated::compile(&self.ctx, properties, items, &self.delta)? {
                Unevaluated::Static(validators) => self.extend(validators),
                Unevaluated::Dynamic(finalizer) => dynamic = Some(finalizer),
            }
            if properties.is_some() {
                self.delta.apply(&EvaluationDelta::all_properties());
            }
            if items.is_some() {
                self.delta.apply(&EvaluationDelta::all_items());
            }
        }
        self.strict_checks()?;
        self.unused_keywords()?;
        Ok(self.into_compiled(dynamic))
    }

    fn has(&self, keyword: &str) -> bool {
        self.consumed.contains(keyword)
    }

    fn strict_checks(&self) -> Result<(), CompileStop> {
        if !self.ctx.options().mode.is_strict() {
            return Ok(());
        }
        let location = &self.ctx.location;
        let constrained = self.has("const") || self.has("enum");
        if let Some(types) = self.types {
            if types.contains(JsonType::String)
                && !constrained
                && !["pattern", "format", "contentEncoding", "contentMediaType", "contentSchema"]
                    .iter()
                    .any(|keyword| self.has(keyword))
            {
                return Err(CompileError::strict(
                    location,
                    "a string schema needs 'pattern', 'format', 'const', 'enum' or a content keyword",
                )
                .into());
            }
            if types.contains(JsonType::Object)
                && !constrained
                && !self.has("additionalProperties")
                && !self.ctx.enclosing_properties
            {
                return Err(CompileError::strict(
                    location,
                    "an object schema needs 'additionalProperties' or 'unevaluatedProperties'",
                )
                .into());
            }
            let items_schema = self.has("items")
                && self.map.get("items").is_some_and(|items| !items.is_array());
            if types.contains(JsonType::Array)
                && !constrained
                && !items_schema
                && !self.has("additionalItems")
                && !self.ctx.enclosing_items
            {
                return Err(CompileError::strict(
                    location,
                    "an array schema needs 'items', 'additionalItems' or 'unevaluatedItems'",
                )
                .into());
            }
        }
        if let Some(Value::String(pattern)) =
            self.map.get("pattern").filter(|_| self.has("pattern"))
        {
            let location = self.ctx.keyword_location("pattern");
            let info = jsonsafe_regex::analyze(pattern)
                .map_err(|error| unanalyzable(&location, &error))?;
            if !info.is_anchored() {
                return Err(CompileError::strict(
                    &location,
                    "the pattern must be anchored with '^' and '$'",
                )
                .into());
            }
            if info.is_complex() && !self.has("maxLength") {
                return Err(CompileError::strict(
                    &location,
                    "a complex pattern needs 'maxLength' on the same schema",
                )
                .into());
            }
        }
        if let Some(Value::Object(patterns)) = self
            .map
            .get("patternProperties")
            .filter(|_| self.has("patternProperties"))
        {
            let location = self.ctx.keyword_location("patternProperties");
            let names_limited = self
                .map
                .get("propertyNames")
                .and_then(|names| names.get("maxLength"))
                .is_some();
            for pattern in patterns.keys() {
                let info = jsonsafe_regex::analyze(pattern)
                    .map_err(|error| unanalyzable(&location.join(pattern), &error))?;
                if !info.is_anchored() {
                    return Err(CompileError::strict(
                        &location.join(pattern),
                        "the pattern must be anchored with '^' and '$'",
                    )
                    .into());
                }
                if info.is_complex() && !names_limited {
                    return Err(CompileError::strict(
                        &location.join(pattern),
                        "a complex pattern needs 'propertyNames.maxLength'",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn unused_keywords(&self) -> Result<(), CompileStop> {
        if self.ctx.options().mode.is_permissive() {
            return Ok(());
        }
        for keyword in self.map.keys() {
            if self.consumed.contains(keyword.as_str()) {
                continue;
            }
            let location = self.ctx.keyword_location(keyword);
            return Err(if self.ctx.draft.is_known_keyword(keyword) {
                CompileError::UnprocessedKeyword {
                    keyword: keyword.clone(),
                    location,
                    reason: unprocessed_reason(keyword),
                }
            } else {
                CompileError::UnknownKeyword {
                    keyword: keyword.clone(),
                    location,
                }
            }
            .into());
        }
        Ok(())
    }

    fn into_compiled(self, dynamic: Option<keywords::unevaluated::DynamicUnevaluated>) -> Compiled {
        let node = SchemaNode::new(self.validators, self.ctx.location.clone())
            .with_resource(self.entry)
            .with_unevaluated(dynamic);
        Compiled {
            node,
            delta: self.delta,
        }
    }
}

/// Fold the deltas of alternatives with OR.
pub(crate) fn any_delta<'d>(
    deltas: impl IntoIterator<Item = &'d EvaluationDelta>,
) -> EvaluationDelta {
    deltas
        .into_iter()
        .fold(EvaluationDelta::impossible(), |merged, delta| merged.or(delta, &pattern_matches))
}

fn schema_list<'a>(
    ctx: &Context<'a>,
    keyword: &str,
    value: &'a Value,
) -> Result<&'a Vec<Value>, CompileError> {
    match value {
        Value::Array(schemas) if !schemas.is_empty() => Ok(schemas),
        Value::Array(_) => Err(CompileError::invalid_keyword(
            ctx.location(),
            keyword,
            value,
            "expected a non-empty array",
        )),
        _ => Err(CompileError::invalid_keyword(
            ctx.location(),
            keyword,
            value,
            "expected an array of schemas",
        )),
    }
}

/// Compile each schema of an array-valued applicator whose subschemas must all pass.
pub(crate) fn compile_all<'a>(
    ctx: &Context<'a>,
    keyword: &str,
    value: &'a Value,
) -> Result<Vec<Compiled>, CompileStop> {
    let schemas = schema_list(ctx, keyword, value)?;
    let ctx = ctx.new_at_location(keyword);
    schemas
        .iter()
        .enumerate()
        .map(|(idx, schema)| compile(&ctx.new_at_location(idx), schema))
        .collect()
}

/// Compile each schema of `anyOf` / `oneOf` as a conditional branch whose outcome is bound to
/// a listing identifier.
pub(crate) fn compile_alternatives<'a>(
    ctx: &Context<'a>,
    keyword: &str,
    value: &'a Value,
) -> Result<Vec<(SafeCode, Compiled)>, CompileStop> {
    let schemas = schema_list(ctx, keyword, value)?;
    let branches = ctx.new_at_location(keyword).as_conditional();
    schemas
        .iter()
        .enumerate()
        .map(|(idx, schema)| {
            let branch = branches.new_at_location(idx);
            ctx.subcheck(|| compile(&branch, schema))
        })
        .collect()
}

/// Names listed in `required`, for presence guards.
pub(crate) fn required_names(required: Option<&Value>) -> BTreeSet<&str> {
    required
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Strict mode only accepts patterns it can classify.
fn unanalyzable(location: &Location, error: &jsonsafe_regex::Error) -> CompileError {
    CompileError::strict(location, error.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::{applies, unprocessed_reason};
    use crate::{
        types::{JsonType, JsonTypeSet},
        CompileError, Mode,
    };

    #[test_case(JsonType::Number, JsonTypeSet::empty().insert(JsonType::Integer), true)]
    #[test_case(JsonType::Number, JsonTypeSet::empty().insert(JsonType::String), false)]
    #[test_case(
        JsonType::Object,
        JsonTypeSet::empty().insert(JsonType::Object).insert(JsonType::Null),
        true
    )]
    fn test_applies(family: JsonType, types: JsonTypeSet, expected: bool) {
        assert_eq!(applies(types, family), expected);
    }

    #[test]
    fn test_unprocessed_reason() {
        assert_eq!(unprocessed_reason("then"), "requires 'if' on the same schema");
        assert_eq!(unprocessed_reason("foo"), "has no effect here");
    }

    #[test]
    fn test_type_mismatch() {
        let error =
            crate::validator_for(&json!({"type": "string", "minimum": 1})).expect_err("Mismatch");
        assert!(matches!(
            error,
            CompileError::TypeMismatch { ref keyword, .. } if keyword == "minimum"
        ));
        assert_eq!(error.location().expect("Has a location").as_str(), "/minimum");
        crate::options()
            .with_mode(Mode::Permissive)
            .build(&json!({"type": "string", "minimum": 1}))
            .expect("Permissive mode ignores the mismatch");
    }

    #[test_case(&json!({"then": {}}), "then")]
    #[test_case(
        &json!({"$schema": "http://json-schema.org/draft-07/schema#", "additionalItems": false}),
        "additionalItems"
    )]
    #[test_case(&json!({"minContains": 1}), "minContains")]
    fn test_unprocessed(schema: &serde_json::Value, expected: &str) {
        let error = crate::validator_for(schema).expect_err("Unprocessed keyword");
        assert!(matches!(
            error,
            CompileError::UnprocessedKeyword { ref keyword, .. } if keyword == expected
        ));
    }

    #[test_case(&json!({"type": 5}))]
    #[test_case(&json!({"minLength": -1}))]
    #[test_case(&json!({"minLength": 1.5}))]
    #[test_case(&json!({"required": "a"}))]
    #[test_case(&json!({"allOf": []}))]
    #[test_case(&json!({"properties": []}))]
    #[test_case(&json!({"pattern": "^[a-"}))]
    #[test_case(&json!(null))]
    #[test_case(&json!({"$defs": []}))]
    fn test_malformed(schema: &serde_json::Value) {
        assert!(crate::validator_for(schema).is_err());
    }

    #[test]
    fn test_listing() {
        let validator = crate::validator_for(&json!({
            "type": "object",
            "properties": {"name": {"type": "string", "maxLength": 3}},
            "required": ["name"]
        }))
        .expect("Valid schema");
        let listing = validator.listing();
        assert!(listing
            .starts_with("const stringLength = require(\"jsonsafe/primitives\").stringLength;\n"));
        assert!(listing.contains("function validate(data) {"));
        assert!(listing.contains("return fail(\"/properties/name/maxLength\")"));
        assert!(listing.trim_end().ends_with("})()"));
    }

    #[test]
    fn test_listing_drops_empty_blocks() {
        let empty = crate::validator_for(&json!({})).expect("Valid schema");
        let unconstrained = crate::validator_for(&json!({
            "properties": {"a": {}, "b": true},
            "additionalProperties": true
        }))
        .expect("Valid schema");
        assert_eq!(unconstrained.listing(), empty.listing());
        let constrained =
            crate::validator_for(&json!({"properties": {"a": {}, "b": {"type": "string"}}}))
                .expect("Valid schema");
        let listing = constrained.listing();
        assert!(listing.contains("if (data[\"b\"] !== undefined) {"));
        assert!(!listing.contains("data[\"a\"]"));
        assert!(!listing.contains("Object.keys"));
    }

    #[test]
    fn test_listing_escapes_schema_strings() {
        let validator = crate::validator_for(&json!({
            "properties": {"\"); process.exit(1); (\"": {"const": "\u{2028}"}}
        }))
        .expect("Valid schema");
        let listing = validator.listing();
        assert!(!listing.contains("process.exit(1); (\"]"));
        assert!(listing.contains("\\\"); process.exit(1); (\\\""));
        assert!(!listing.contains('\u{2028}'));
    }
}
