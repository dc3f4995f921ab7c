//! Static evaluation tracing.
//!
//! An [`EvaluationDelta`] describes the properties and items a subschema is guaranteed to
//! evaluate whenever it passes. `unevaluatedProperties` and `unevaluatedItems` are resolved from
//! the delta of their siblings when it is static, and fall back to runtime tracking when it is
//! not.
use std::collections::BTreeSet;

/// Items guaranteed to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Items {
    /// The first `n` items.
    Count(u64),
    /// All of them.
    Unbounded,
}

impl Items {
    fn max(self, other: Items) -> Items {
        match (self, other) {
            (Items::Unbounded, _) | (_, Items::Unbounded) => Items::Unbounded,
            (Items::Count(a), Items::Count(b)) => Items::Count(a.max(b)),
        }
    }

    fn min(self, other: Items) -> Items {
        match (self, other) {
            (Items::Unbounded, other) | (other, Items::Unbounded) => other,
            (Items::Count(a), Items::Count(b)) => Items::Count(a.min(b)),
        }
    }

    /// Whether the item at `idx` is covered.
    pub(crate) fn covers(self, idx: usize) -> bool {
        match self {
            Items::Unbounded => true,
            Items::Count(count) => (idx as u64) < count,
        }
    }
}

/// Properties guaranteed to be evaluated, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Properties {
    Names(BTreeSet<String>),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvaluationDelta {
    pub(crate) items: Items,
    pub(crate) properties: Properties,
    /// Patterns whose matching property names are evaluated.
    pub(crate) patterns: BTreeSet<String>,
    /// The guarantee depends on which branch of a union passed.
    pub(crate) dynamic: bool,
    /// The subschema never passes.
    pub(crate) never: bool,
}

impl Default for EvaluationDelta {
    fn default() -> Self {
        EvaluationDelta::neutral()
    }
}

impl EvaluationDelta {
    /// Evaluates nothing. Identity of AND.
    pub(crate) fn neutral() -> Self {
        EvaluationDelta {
            items: Items::Count(0),
            properties: Properties::Names(BTreeSet::new()),
            patterns: BTreeSet::new(),
            dynamic: false,
            never: false,
        }
    }

    /// Never passes, e.g. the `false` schema. Identity of OR.
    pub(crate) fn impossible() -> Self {
        EvaluationDelta {
            items: Items::Unbounded,
            properties: Properties::All,
            patterns: BTreeSet::new(),
            dynamic: false,
            never: true,
        }
    }

    /// Whatever the target of a still-compiling reference evaluates is unknown.
    pub(crate) fn unknown() -> Self {
        EvaluationDelta {
            dynamic: true,
            ..EvaluationDelta::neutral()
        }
    }

    pub(crate) fn items(count: u64) -> Self {
        EvaluationDelta {
            items: Items::Count(count),
            ..EvaluationDelta::neutral()
        }
    }

    pub(crate) fn all_items() -> Self {
        EvaluationDelta {
            items: Items::Unbounded,
            ..EvaluationDelta::neutral()
        }
    }

    pub(crate) fn properties<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EvaluationDelta {
            properties: Properties::Names(names.into_iter().map(Into::into).collect()),
            ..EvaluationDelta::neutral()
        }
    }

    pub(crate) fn all_properties() -> Self {
        EvaluationDelta {
            properties: Properties::All,
            ..EvaluationDelta::neutral()
        }
    }

    pub(crate) fn patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EvaluationDelta {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..EvaluationDelta::neutral()
        }
    }

    #[must_use]
    pub(crate) fn into_dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Whether the property `name` is covered, by name or by one of the patterns.
    pub(crate) fn covers_property(
        &self,
        name: &str,
        matches: &impl Fn(&str, &str) -> bool,
    ) -> bool {
        match &self.properties {
            Properties::All => true,
            Properties::Names(names) => {
                names.contains(name) || self.patterns.iter().any(|pattern| matches(pattern, name))
            }
        }
    }

    /// Both guarantees hold.
    #[must_use]
    pub(crate) fn and(&self, other: &EvaluationDelta) -> EvaluationDelta {
        let properties = match (&self.properties, &other.properties) {
            (Properties::All, _) | (_, Properties::All) => Properties::All,
            (Properties::Names(a), Properties::Names(b)) => {
                Properties::Names(a.union(b).cloned().collect())
            }
        };
        EvaluationDelta {
            items: self.items.max(other.items),
            properties,
            patterns: self.patterns.union(&other.patterns).cloned().collect(),
            dynamic: self.dynamic || other.dynamic,
            never: self.never || other.never,
        }
    }

    /// Merge `other` into `self` with [`EvaluationDelta::and`].
    pub(crate) fn apply(&mut self, other: &EvaluationDelta) {
        *self = self.and(other);
    }

    /// Only one of the guarantees is known to hold. `matches(pattern, name)` tests a property
    /// name against a pattern source.
    #[must_use]
    pub(crate) fn or(
        &self,
        other: &EvaluationDelta,
        matches: &impl Fn(&str, &str) -> bool,
    ) -> EvaluationDelta {
        if self.never {
            return other.clone();
        }
        if other.never {
            return self.clone();
        }
        let properties = match (&self.properties, &other.properties) {
            (Properties::All, Properties::All) => Properties::All,
            // Everything the named side covers is covered by both.
            (Properties::All, Properties::Names(names))
            | (Properties::Names(names), Properties::All) => {
                Properties::Names(names.clone())
            }
            (Properties::Names(a), Properties::Names(b)) => Properties::Names(
                a.iter()
                    .chain(b.iter())
                    .filter(|name| {
                        self.covers_property(name, matches) && other.covers_property(name, matches)
                    })
                    .cloned()
                    .collect(),
            ),
        };
        let patterns = match (&self.properties, &other.properties) {
            (Properties::All, _) => other.patterns.clone(),
            (_, Properties::All) => self.patterns.clone(),
            _ => self.patterns.intersection(&other.patterns).cloned().collect(),
        };
        let mut merged = EvaluationDelta {
            items: self.items.min(other.items),
            properties,
            patterns,
            dynamic: false,
            never: false,
        };
        merged.dynamic = self.dynamic
            || other.dynamic
            || self.items != other.items
            || !merged.implies(self, matches)
            || !merged.implies(other, matches);
        merged
    }

    /// Whether everything `other` covers is covered by `self`.
    fn implies(&self, other: &EvaluationDelta, matches: &impl Fn(&str, &str) -> bool) -> bool {
        match (&self.properties, &other.properties) {
            (Properties::All, _) => true,
            (Properties::Names(_), Properties::All) => false,
            (Properties::Names(_), Properties::Names(names)) => {
                names.iter().all(|name| self.covers_property(name, matches))
                    && other.patterns.is_subset(&self.patterns)
            }
        }
    }
}
