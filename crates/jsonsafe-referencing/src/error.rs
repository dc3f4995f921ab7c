use thiserror::Error;

/// Errors raised while resolving references or detecting dialects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `$schema` names a dialect this crate does not know.
    #[error("Unknown meta-schema: '{uri}'")]
    UnknownSpecification { uri: String },
    /// `$schema` is present but is not a string.
    #[error("`$schema` must be a string")]
    InvalidSpecification,
    /// An anchor value that could never be addressed by a fragment.
    #[error("Invalid anchor '{anchor}': {reason}")]
    InvalidAnchor { anchor: String, reason: &'static str },
    /// A fragment is neither empty, a JSON Pointer, nor a plain name.
    #[error("Invalid JSON Pointer '{pointer}'")]
    InvalidPointer { pointer: String },
}

impl Error {
    pub(crate) fn invalid_anchor(anchor: impl Into<String>, reason: &'static str) -> Error {
        Error::InvalidAnchor {
            anchor: anchor.into(),
            reason,
        }
    }
}
