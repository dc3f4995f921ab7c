//! Regex compilation for `pattern`, `patternProperties` and the `regex` format.
use std::fmt;

/// A compiled pattern.
///
/// Literal patterns skip the regex engines entirely. Patterns the `regex` crate rejects (usually
/// look-around or back-references) are handed to `fancy-regex`.
pub(crate) enum CompiledRegex {
    Prefix { literal: String, source: String },
    Exact { exact: String, source: String },
    Standard { regex: regex::Regex, source: String },
    Fancy { regex: fancy_regex::Regex, source: String },
}

/// Failure to compile a pattern with either engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexCompileError(pub(crate) String);

impl fmt::Display for RegexCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of analyzing a pattern for literal-match optimizations.
#[derive(Debug, PartialEq)]
pub(crate) enum PatternOptimization {
    /// `^prefix`, matched with `starts_with`.
    Prefix(String),
    /// `^exact$`, matched with `==`.
    Exact(String),
}

/// Return a [`PatternOptimization`] if the pattern is a literal with a start anchor.
///
/// Accepts unescaped alphanumeric chars, `-`, `_`, `/` and the escapes `\/`, `\-`, `\_`, `\$`,
/// `\.` in the literal body. A trailing unescaped `$` makes it exact.
pub(crate) fn analyze_pattern(pattern: &str) -> Option<PatternOptimization> {
    let suffix = pattern.strip_prefix('^')?;
    let mut literal = String::new();
    let mut chars = suffix.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                c @ ('/' | '-' | '_' | '$' | '.') => literal.push(c),
                _ => return None,
            }
        } else if c == '$' {
            if chars.peek().is_none() {
                return Some(PatternOptimization::Exact(literal));
            }
            return None;
        } else if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/') {
            literal.push(c);
        } else {
            return None;
        }
    }
    Some(PatternOptimization::Prefix(literal))
}

impl CompiledRegex {
    pub(crate) fn new(pattern: &str) -> Result<CompiledRegex, RegexCompileError> {
        let source = pattern.to_string();
        match analyze_pattern(pattern) {
            Some(PatternOptimization::Prefix(literal)) => {
                return Ok(CompiledRegex::Prefix { literal, source })
            }
            Some(PatternOptimization::Exact(exact)) => {
                return Ok(CompiledRegex::Exact { exact, source })
            }
            None => {}
        }
        let translated = jsonsafe_regex::translate(pattern);
        match regex::Regex::new(&translated) {
            Ok(regex) => Ok(CompiledRegex::Standard { regex, source }),
            Err(_) => fancy_regex::Regex::new(&translated)
                .map(|regex| CompiledRegex::Fancy { regex, source })
                .map_err(|error| RegexCompileError(error.to_string())),
        }
    }

    /// The pattern as written in the schema.
    pub(crate) fn source(&self) -> &str {
        match self {
            CompiledRegex::Prefix { source, .. }
            | CompiledRegex::Exact { source, .. }
            | CompiledRegex::Standard { source, .. }
            | CompiledRegex::Fancy { source, .. } => source,
        }
    }

    /// Match `text`. Only the backtracking engine can fail, when it runs out of its budget.
    pub(crate) fn is_match(&self, text: &str) -> Result<bool, fancy_regex::Error> {
        match self {
            CompiledRegex::Prefix { literal, .. } => Ok(text.starts_with(literal.as_str())),
            CompiledRegex::Exact { exact, .. } => Ok(text == exact),
            CompiledRegex::Standard { regex, .. } => Ok(regex.is_match(text)),
            CompiledRegex::Fancy { regex, .. } => regex.is_match(text),
        }
    }
}

impl fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledRegex").field(&self.source()).finish()
    }
}

/// Test a property name against a pattern source at compile time.
pub(crate) fn pattern_matches(pattern: &str, name: &str) -> bool {
    CompiledRegex::new(pattern)
        .ok()
        .is_some_and(|regex| regex.is_match(name).unwrap_or(false))
}
