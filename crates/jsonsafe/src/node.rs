use serde_json::Value;

use crate::{
    error::{no_error, ErrorIterator, ValidationError},
    keywords::{unevaluated::DynamicUnevaluated, BoxedValidator},
    paths::{LazyLocation, Location},
    validator::{Evaluated, ValidationContext},
};

/// Runtime scope changes made when a schema resource is entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResourceEntry {
    /// Subroutine of a resource with `$recursiveAnchor: true`.
    pub(crate) recursive_anchor: Option<usize>,
    /// Index of the resource's `$dynamicAnchor` table.
    pub(crate) dynamic_anchors: Option<usize>,
}

impl ResourceEntry {
    pub(crate) fn is_empty(self) -> bool {
        self.recursive_anchor.is_none() && self.dynamic_anchors.is_none()
    }
}

/// A compiled schema node: all keyword validators of a single schema object.
pub(crate) struct SchemaNode {
    validators: Vec<BoxedValidator>,
    location: Location,
    resource: Option<ResourceEntry>,
    unevaluated: Option<Box<DynamicUnevaluated>>,
}

impl SchemaNode {
    pub(crate) fn new(validators: Vec<BoxedValidator>, location: Location) -> SchemaNode {
        SchemaNode {
            validators,
            location,
            resource: None,
            unevaluated: None,
        }
    }

    pub(crate) fn with_resource(mut self, entry: ResourceEntry) -> SchemaNode {
        self.resource = (!entry.is_empty()).then_some(entry);
        self
    }

    pub(crate) fn with_unevaluated(
        mut self,
        unevaluated: Option<DynamicUnevaluated>,
    ) -> SchemaNode {
        self.unevaluated = unevaluated.map(Box::new);
        self
    }

    /// Attach the dynamic anchors of the enclosing resource, unless the node has its own.
    pub(crate) fn inherit_dynamic_anchors(&mut self, anchors: usize) {
        let mut entry = self.resource.unwrap_or_default();
        if entry.dynamic_anchors.is_none() {
            entry.dynamic_anchors = Some(anchors);
        }
        self.resource = Some(entry);
    }

    fn is_valid_inner(&self, instance: &Value, ctx: &mut ValidationContext<'_>) -> bool {
        if !self
            .validators
            .iter()
            .all(|validator| validator.is_valid(instance, ctx))
        {
            return false;
        }
        match &self.unevaluated {
            Some(unevaluated) => unevaluated.is_valid(instance, &self.validators, ctx),
            None => true,
        }
    }

    fn validate_inner<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<(), ValidationError<'i>> {
        for validator in &self.validators {
            validator.validate(instance, location, ctx)?;
        }
        if let Some(unevaluated) = &self.unevaluated {
            unevaluated.validate(instance, location, &self.validators, ctx)?;
        }
        Ok(())
    }

    #[allow(clippy::needless_collect)]
    fn iter_errors_inner<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> ErrorIterator<'i> {
        let mut errors = Vec::new();
        for validator in &self.validators {
            errors.extend(validator.iter_errors(instance, location, ctx));
        }
        if let Some(unevaluated) = &self.unevaluated {
            if errors.is_empty() {
                if let Err(error) =
                    unevaluated.validate(instance, location, &self.validators, ctx)
                {
                    errors.push(error);
                }
            }
        }
        if errors.is_empty() {
            no_error()
        } else {
            Box::new(errors.into_iter())
        }
    }

    pub(crate) fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext<'_>) -> bool {
        let frame = ctx.enter(self.resource);
        let result = self.is_valid_inner(instance, ctx);
        ctx.leave(frame);
        result
    }

    pub(crate) fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<(), ValidationError<'i>> {
        let frame = ctx.enter(self.resource);
        let result = self.validate_inner(instance, location, ctx);
        ctx.leave(frame);
        result
    }

    pub(crate) fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> ErrorIterator<'i> {
        let frame = ctx.enter(self.resource);
        let result = self.iter_errors_inner(instance, location, ctx);
        ctx.leave(frame);
        result
    }

    /// Mark what this node evaluates in `instance`, which has to be valid against it.
    pub(crate) fn record(
        &self,
        instance: &Value,
        ctx: &mut ValidationContext<'_>,
        evaluated: &mut Evaluated,
    ) {
        let frame = ctx.enter(self.resource);
        for validator in &self.validators {
            validator.record(instance, ctx, evaluated);
        }
        if let Some(unevaluated) = &self.unevaluated {
            unevaluated.record(evaluated);
        }
        ctx.leave(frame);
    }

    pub(crate) fn normalize(&self, instance: &mut Value, ctx: &mut ValidationContext<'_>) {
        let frame = ctx.enter(self.resource);
        for validator in &self.validators {
            validator.normalize(instance, ctx);
        }
        ctx.leave(frame);
    }
}

impl std::fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaNode")
            .field("location", &self.location)
            .field("validators", &self.validators.len())
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
