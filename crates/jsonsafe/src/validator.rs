//! The compiled validator and the trait every keyword validator implements.
use ahash::AHashSet;
use jsonsafe_referencing::Draft;
use serde_json::Value;

use crate::{
    error::{error, no_error, ErrorIterator, ValidationError, ValidationOutput},
    node::{ResourceEntry, SchemaNode},
    paths::LazyLocation,
};

/// The Validate trait represents a predicate over some JSON value. Some validators are very
/// simple predicates such as "a value which is a string", whereas others may be much more
/// complex, consisting of several other validators composed together in various ways.
///
/// `validate` has to fail exactly when `is_valid` returns `false`.
pub(crate) trait Validate: Send + Sync {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext<'_>) -> bool;

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> Result<(), ValidationError<'i>>;

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext<'_>,
    ) -> ErrorIterator<'i> {
        match self.validate(instance, location, ctx) {
            Ok(()) => no_error(),
            Err(err) => error(err),
        }
    }

    /// Mark the members of `instance` this validator evaluates. Only called when `instance` is
    /// valid against the validator.
    fn record(
        &self,
        _instance: &Value,
        _ctx: &mut ValidationContext<'_>,
        _evaluated: &mut Evaluated,
    ) {
    }

    /// Apply defaults and drop unlisted members before validation.
    fn normalize(&self, _instance: &mut Value, _ctx: &mut ValidationContext<'_>) {}
}

/// Members of an instance evaluated at runtime, for `unevaluatedProperties` and
/// `unevaluatedItems` that can not be resolved statically.
#[derive(Debug, Default)]
pub(crate) struct Evaluated {
    all_properties: bool,
    properties: AHashSet<String>,
    all_items: bool,
    prefix: usize,
    indices: AHashSet<usize>,
}

impl Evaluated {
    pub(crate) fn mark_all_properties(&mut self) {
        self.all_properties = true;
    }

    pub(crate) fn mark_property(&mut self, name: &str) {
        if !self.all_properties && !self.properties.contains(name) {
            self.properties.insert(name.to_string());
        }
    }

    pub(crate) fn mark_all_items(&mut self) {
        self.all_items = true;
    }

    pub(crate) fn mark_prefix(&mut self, count: usize) {
        self.prefix = self.prefix.max(count);
    }

    pub(crate) fn mark_index(&mut self, idx: usize) {
        if !self.all_items && idx >= self.prefix {
            self.indices.insert(idx);
        }
    }

    pub(crate) fn is_property_evaluated(&self, name: &str) -> bool {
        self.all_properties || self.properties.contains(name)
    }

    pub(crate) fn is_item_evaluated(&self, idx: usize) -> bool {
        self.all_items || idx < self.prefix || self.indices.contains(&idx)
    }
}

/// Named `$dynamicAnchor`s of a single schema resource, pointing to subroutines.
pub(crate) type DynamicAnchors = Vec<(String, usize)>;

/// What a resource changed on entry, restored on exit.
pub(crate) struct Frame {
    recursive: Option<Option<usize>>,
    pushed: bool,
}

/// Per-call runtime state.
pub(crate) struct ValidationContext<'v> {
    subroutines: &'v [SchemaNode],
    anchors: &'v [DynamicAnchors],
    /// The outermost resource with `$recursiveAnchor: true` entered so far.
    recursive: Option<usize>,
    /// Resources with dynamic anchors, outermost first.
    dynamic_scope: Vec<usize>,
}

impl<'v> ValidationContext<'v> {
    pub(crate) fn new(subroutines: &'v [SchemaNode], anchors: &'v [DynamicAnchors]) -> Self {
        ValidationContext {
            subroutines,
            anchors,
            recursive: None,
            dynamic_scope: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn subroutine(&self, idx: usize) -> &'v SchemaNode {
        &self.subroutines[idx]
    }

    #[inline]
    pub(crate) fn enter(&mut self, entry: Option<ResourceEntry>) -> Frame {
        let mut frame = Frame {
            recursive: None,
            pushed: false,
        };
        if let Some(entry) = entry {
            if let Some(idx) = entry.recursive_anchor {
                if self.recursive.is_none() {
                    frame.recursive = Some(self.recursive);
                    self.recursive = Some(idx);
                }
            }
            if let Some(resource) = entry.dynamic_anchors {
                self.dynamic_scope.push(resource);
                frame.pushed = true;
            }
        }
        frame
    }

    #[inline]
    pub(crate) fn leave(&mut self, frame: Frame) {
        if let Some(previous) = frame.recursive {
            self.recursive = previous;
        }
        if frame.pushed {
            self.dynamic_scope.pop();
        }
    }

    /// Target of `$recursiveRef` whose static target is `fallback`.
    pub(crate) fn recursive_target(&self, fallback: usize) -> usize {
        self.recursive.unwrap_or(fallback)
    }

    /// Target of `$dynamicRef` to `anchor`: the outermost resource in scope defining it.
    pub(crate) fn dynamic_target(&self, anchor: &str, fallback: usize) -> usize {
        self.dynamic_scope
            .iter()
            .find_map(|resource| {
                self.anchors[*resource]
                    .iter()
                    .find(|(name, _)| name == anchor)
                    .map(|(_, idx)| *idx)
            })
            .unwrap_or(fallback)
    }
}

/// A compiled schema.
///
/// Compile once with [`crate::validator_for`] or [`crate::ValidationOptions::build`], then
/// validate any number of instances, from any number of threads.
pub struct Validator {
    pub(crate) subroutines: Vec<SchemaNode>,
    pub(crate) anchors: Vec<DynamicAnchors>,
    pub(crate) collect_all_errors: bool,
    pub(crate) include_error_details: bool,
    pub(crate) dynamic_tracing: bool,
    pub(crate) listing: String,
    pub(crate) draft: Draft,
}

impl Validator {
    fn root(&self) -> &SchemaNode {
        &self.subroutines[0]
    }

    fn context(&self) -> ValidationContext<'_> {
        ValidationContext::new(&self.subroutines, &self.anchors)
    }

    /// Run validation against `instance`.
    ///
    /// Stops at the first failure unless the validator was built with
    /// `should_collect_all_errors(true)`. With error details disabled, only `valid` is set.
    #[must_use]
    pub fn validate<'i>(&self, instance: &'i Value) -> ValidationOutput<'i> {
        let mut ctx = self.context();
        if !self.include_error_details {
            return ValidationOutput {
                valid: self.root().is_valid(instance, &mut ctx),
                errors: Vec::new(),
            };
        }
        let location = LazyLocation::new();
        if self.collect_all_errors {
            let errors: Vec<_> = self.root().iter_errors(instance, &location, &mut ctx).collect();
            ValidationOutput {
                valid: errors.is_empty(),
                errors,
            }
        } else {
            match self.root().validate(instance, &location, &mut ctx) {
                Ok(()) => ValidationOutput::valid(),
                Err(error) => ValidationOutput {
                    valid: false,
                    errors: vec![error],
                },
            }
        }
    }

    /// Whether `instance` is valid.
    #[must_use]
    pub fn is_valid(&self, instance: &Value) -> bool {
        let mut ctx = self.context();
        self.root().is_valid(instance, &mut ctx)
    }

    /// Every error for `instance`, regardless of the configured error collection.
    pub fn iter_errors<'i>(
        &self,
        instance: &'i Value,
    ) -> impl Iterator<Item = ValidationError<'i>> {
        let mut ctx = self.context();
        self.root()
            .iter_errors(instance, &LazyLocation::new(), &mut ctx)
    }

    /// Apply defaults and remove unlisted members as configured, then validate.
    #[must_use]
    pub fn validate_mut(&self, instance: &mut Value) -> ValidationOutput<'static> {
        let mut ctx = self.context();
        self.root().normalize(instance, &mut ctx);
        self.validate(instance).to_owned()
    }

    /// Whether `unevaluatedProperties` / `unevaluatedItems` needed runtime tracking.
    #[must_use]
    pub fn uses_dynamic_tracing(&self) -> bool {
        self.dynamic_tracing
    }

    /// The listing of the compiled validator as a self-contained module.
    #[must_use]
    pub fn listing(&self) -> &str {
        &self.listing
    }

    /// Dialect of the root document.
    #[must_use]
    pub fn draft(&self) -> Draft {
        self.draft
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("subroutines", &self.subroutines.len())
            .field("draft", &self.draft)
            .field("dynamic_tracing", &self.dynamic_tracing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Evaluated;

    #[test]
    fn test_evaluated() {
        let mut evaluated = Evaluated::default();
        evaluated.mark_property("a");
        evaluated.mark_prefix(2);
        evaluated.mark_index(5);
        assert!(evaluated.is_property_evaluated("a"));
        assert!(!evaluated.is_property_evaluated("b"));
        assert!(evaluated.is_item_evaluated(1));
        assert!(!evaluated.is_item_evaluated(2));
        assert!(evaluated.is_item_evaluated(5));
        evaluated.mark_all_properties();
        evaluated.mark_all_items();
        assert!(evaluated.is_property_evaluated("b"));
        assert!(evaluated.is_item_evaluated(100));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_validator_is_thread_safe() {
        assert_send_sync::<super::Validator>();
    }
}
