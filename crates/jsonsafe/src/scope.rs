//! Per-compilation symbol table.
//!
//! Holds every subroutine (reference targets and the root), deduplicated regexes, listing
//! constants and the runtime primitives the listing imports. Dropped once the [`Validator`] is
//! assembled.
use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    sync::Arc,
};

use ahash::AHashMap;
use jsonsafe_referencing::Draft;
use serde_json::Value;

use crate::{
    error::CompileError,
    lines::Lines,
    node::SchemaNode,
    options::ValidationOptions,
    primitives::Primitive,
    regex::{CompiledRegex, RegexCompileError},
    template::{format, Arg, SafeCode, TemplateError},
    tracer::EvaluationDelta,
    validator::{DynamicAnchors, Validator},
};

/// Subroutines are shared per schema object and per strict-mode context.
pub(crate) type SubroutineKey = (usize, bool, bool);

struct Subroutine {
    name: SafeCode,
    node: Option<SchemaNode>,
    delta: Option<EvaluationDelta>,
    listing: Lines,
}

pub(crate) struct Scope<'a> {
    pub(crate) options: &'a ValidationOptions,
    /// The document compilation started from.
    pub(crate) root: &'a Value,
    /// Whether `unevaluated*` keywords may fall back to runtime tracking.
    pub(crate) dynamic: bool,
    subroutines: RefCell<Vec<Subroutine>>,
    index: RefCell<AHashMap<SubroutineKey, usize>>,
    regexes: RefCell<AHashMap<String, (SafeCode, Arc<CompiledRegex>)>>,
    constants: RefCell<Vec<(SafeCode, SafeCode)>>,
    primitives: RefCell<BTreeSet<Primitive>>,
    counters: RefCell<AHashMap<&'static str, usize>>,
    uses_dynamic: Cell<bool>,
    anchors: RefCell<Vec<DynamicAnchors>>,
    resources: RefCell<AHashMap<usize, Option<usize>>>,
    /// Subroutine calls made on the same instance the caller received.
    calls: RefCell<Vec<(usize, usize)>>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(options: &'a ValidationOptions, root: &'a Value, dynamic: bool) -> Scope<'a> {
        Scope {
            options,
            root,
            dynamic,
            subroutines: RefCell::new(Vec::new()),
            index: RefCell::new(AHashMap::new()),
            regexes: RefCell::new(AHashMap::new()),
            constants: RefCell::new(Vec::new()),
            primitives: RefCell::new(BTreeSet::new()),
            counters: RefCell::new(AHashMap::new()),
            uses_dynamic: Cell::new(false),
            anchors: RefCell::new(Vec::new()),
            resources: RefCell::new(AHashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn documents(&self) -> &'a AHashMap<String, Value> {
        &self.options.additional_schemas
    }

    /// A fresh identifier: `prefix0`, `prefix1`, ...
    pub(crate) fn name(&self, prefix: &'static str) -> Result<SafeCode, TemplateError> {
        let mut counters = self.counters.borrow_mut();
        let counter = counters.entry(prefix).or_insert(0);
        let name = SafeCode::identifier(&format!("{prefix}{counter}"))?;
        *counter += 1;
        Ok(name)
    }

    /// Compile `pattern` once per compilation and bind it to a listing constant.
    pub(crate) fn regex(
        &self,
        pattern: &str,
    ) -> Result<(SafeCode, Arc<CompiledRegex>), RegexCompileError> {
        if let Some((name, regex)) = self.regexes.borrow().get(pattern) {
            return Ok((name.clone(), Arc::clone(regex)));
        }
        let regex = Arc::new(CompiledRegex::new(pattern)?);
        let name = self
            .name("pattern")
            .map_err(|error| RegexCompileError(error.to_string()))?;
        let value = format("%r", &[Arg::Regex(&regex)])
            .map_err(|error| RegexCompileError(error.to_string()))?;
        self.constants.borrow_mut().push((name.clone(), value));
        self.regexes
            .borrow_mut()
            .insert(pattern.to_string(), (name.clone(), Arc::clone(&regex)));
        Ok((name, regex))
    }

    /// Bind a schema-provided value to a listing constant.
    pub(crate) fn constant(
        &self,
        prefix: &'static str,
        value: &Value,
    ) -> Result<SafeCode, TemplateError> {
        let name = self.name(prefix)?;
        let literal = format("%j", &[Arg::Literal(Some(value))])?;
        self.constants.borrow_mut().push((name.clone(), literal));
        Ok(name)
    }

    /// Register a runtime primitive and return the name the listing calls it by.
    pub(crate) fn primitive(&self, primitive: Primitive) -> Result<SafeCode, TemplateError> {
        self.primitives.borrow_mut().insert(primitive);
        primitive.code()
    }

    pub(crate) fn mark_dynamic(&self) {
        self.uses_dynamic.set(true);
    }

    pub(crate) fn lookup(&self, key: SubroutineKey) -> Option<usize> {
        self.index.borrow().get(&key).copied()
    }

    /// Install a placeholder subroutine before its target is compiled, so cycles terminate.
    pub(crate) fn reserve(&self, key: SubroutineKey) -> Result<usize, TemplateError> {
        let mut subroutines = self.subroutines.borrow_mut();
        let idx = subroutines.len();
        let name = if idx == 0 {
            SafeCode::identifier("validate")?
        } else {
            self.name("ref")?
        };
        subroutines.push(Subroutine {
            name,
            node: None,
            delta: None,
            listing: Lines::new(),
        });
        self.index.borrow_mut().insert(key, idx);
        Ok(idx)
    }

    pub(crate) fn subroutine_name(&self, idx: usize) -> Option<SafeCode> {
        self.subroutines
            .borrow()
            .get(idx)
            .map(|subroutine| subroutine.name.clone())
    }

    /// The delta of a finished subroutine, or an unknown one while it is still being compiled.
    pub(crate) fn delta_of(&self, idx: usize) -> EvaluationDelta {
        self.subroutines
            .borrow()
            .get(idx)
            .and_then(|subroutine| subroutine.delta.clone())
            .unwrap_or_else(EvaluationDelta::unknown)
    }

    pub(crate) fn finish(
        &self,
        idx: usize,
        node: SchemaNode,
        delta: EvaluationDelta,
        listing: Lines,
    ) {
        if let Some(subroutine) = self.subroutines.borrow_mut().get_mut(idx) {
            subroutine.node = Some(node);
            subroutine.delta = Some(delta);
            subroutine.listing = listing;
        }
    }

    /// Record that `caller` invokes `callee` on its own instance. Returns `true` if the call
    /// closes a cycle of such calls.
    pub(crate) fn add_call(&self, caller: usize, callee: usize) -> bool {
        let mut calls = self.calls.borrow_mut();
        calls.push((caller, callee));
        let mut seen = vec![callee];
        let mut pending = vec![callee];
        while let Some(current) = pending.pop() {
            if current == caller {
                return true;
            }
            for &(from, to) in calls.iter() {
                if from == current && !seen.contains(&to) {
                    seen.push(to);
                    pending.push(to);
                }
            }
        }
        false
    }

    /// The `$dynamicAnchor` table of a resource, keyed by the resource object's address.
    /// `None` if the resource was not scanned yet.
    pub(crate) fn resource_anchors(&self, resource: usize) -> Option<Option<usize>> {
        self.resources.borrow().get(&resource).copied()
    }

    pub(crate) fn reserve_anchors(&self, resource: usize) -> usize {
        let mut anchors = self.anchors.borrow_mut();
        let idx = anchors.len();
        anchors.push(Vec::new());
        self.resources.borrow_mut().insert(resource, Some(idx));
        idx
    }

    pub(crate) fn skip_anchors(&self, resource: usize) {
        self.resources.borrow_mut().insert(resource, None);
    }

    pub(crate) fn set_anchors(&self, idx: usize, table: DynamicAnchors) {
        if let Some(slot) = self.anchors.borrow_mut().get_mut(idx) {
            *slot = table;
        }
    }

    /// Assemble the validator.
    pub(crate) fn into_validator(self, draft: Draft) -> Result<Validator, CompileError> {
        let mut body = Lines::new();
        let mut nodes = Vec::new();
        for subroutine in self.subroutines.into_inner() {
            let Some(node) = subroutine.node else {
                return Err(CompileError::Internal("a subroutine was never compiled"));
            };
            let open = format("function %s(data) {", &[Arg::Code(&subroutine.name)])?;
            body.block::<TemplateError>(&open, &format("}", &[])?, |lines| {
                lines.extend(&subroutine.listing);
                lines.write(&format("return true", &[])?)
            })?;
            nodes.push(node);
        }
        if nodes.is_empty() {
            return Err(CompileError::Internal("no root subroutine"));
        }
        body.write(&format("return validate", &[])?)?;
        let primitives: Vec<_> = self.primitives.into_inner().into_iter().collect();
        let listing = body.module(&self.constants.into_inner(), &primitives);
        let dynamic_tracing = self.uses_dynamic.get();
        tracing::debug!(
            subroutines = nodes.len(),
            dynamic_tracing,
            "Schema compiled"
        );
        Ok(Validator {
            subroutines: nodes,
            anchors: self.anchors.into_inner(),
            collect_all_errors: self.options.collect_all_errors,
            include_error_details: self.options.include_error_details,
            dynamic_tracing,
            listing,
            draft,
        })
    }
}
