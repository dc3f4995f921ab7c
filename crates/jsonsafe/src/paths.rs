//! Keyword and instance locations.
use std::{fmt, sync::Arc};

use jsonsafe_referencing::escape_segment;
use serde::{Serialize, Serializer};

/// A segment of a JSON Pointer: an object key or an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSegment<'a> {
    Property(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for LocationSegment<'a> {
    #[inline]
    fn from(value: &'a str) -> Self {
        LocationSegment::Property(value)
    }
}

impl<'a> From<&'a String> for LocationSegment<'a> {
    #[inline]
    fn from(value: &'a String) -> Self {
        LocationSegment::Property(value.as_str())
    }
}

impl From<usize> for LocationSegment<'_> {
    #[inline]
    fn from(value: usize) -> Self {
        LocationSegment::Index(value)
    }
}

/// Location of a value in the data being validated.
///
/// Built as a borrowed chain on the stack while descending into the instance. Nothing is
/// allocated unless an error turns it into a [`Location`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct LazyLocation<'a> {
    segment: Option<LocationSegment<'a>>,
    parent: Option<&'a LazyLocation<'a>>,
}

impl Default for LazyLocation<'_> {
    fn default() -> Self {
        LazyLocation::new()
    }
}

impl<'a> LazyLocation<'a> {
    pub(crate) const fn new() -> Self {
        LazyLocation {
            segment: None,
            parent: None,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn push(&'a self, segment: impl Into<LocationSegment<'a>>) -> Self {
        LazyLocation {
            segment: Some(segment.into()),
            parent: Some(self),
        }
    }
}

impl LazyLocation<'_> {
    /// Materialize the chain into an owned pointer.
    pub(crate) fn materialize(&self) -> Location {
        let mut segments = Vec::new();
        let mut current = Some(self);
        while let Some(location) = current {
            if let Some(segment) = location.segment {
                segments.push(segment);
            }
            current = location.parent;
        }
        let mut buffer = itoa::Buffer::new();
        let mut pointer = String::new();
        for segment in segments.iter().rev() {
            pointer.push('/');
            match segment {
                LocationSegment::Property(property) => pointer.push_str(&escape_segment(property)),
                LocationSegment::Index(idx) => pointer.push_str(buffer.format(*idx)),
            }
        }
        Location(Arc::new(pointer))
    }
}

/// A JSON Pointer-like location, cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Location(Arc<String>);

impl Location {
    /// The empty location, pointing at the document root.
    #[must_use]
    pub fn new() -> Self {
        Location::default()
    }

    /// A location from an already encoded pointer, such as a canonical reference path.
    pub(crate) fn from_encoded(pointer: impl Into<String>) -> Self {
        Location(Arc::new(pointer.into()))
    }

    /// Append a segment, escaping it.
    #[must_use]
    pub fn join<'a>(&self, segment: impl Into<LocationSegment<'a>>) -> Self {
        let mut pointer = String::with_capacity(self.0.len() + 8);
        pointer.push_str(&self.0);
        pointer.push('/');
        match segment.into() {
            LocationSegment::Property(property) => pointer.push_str(&escape_segment(property)),
            LocationSegment::Index(idx) => pointer.push_str(itoa::Buffer::new().format(idx)),
        }
        Location(Arc::new(pointer))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_str(), f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl PartialEq<str> for Location {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl PartialEq<&str> for Location {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == *other
    }
}
