//! Static analysis of the regular expressions found in `pattern`, `patternProperties` and the
//! `regex` format.
//!
//! Patterns are ECMA-262 flavoured. [`translate`] rewrites the few constructs whose meaning
//! differs from the Rust engines, [`analyze`] classifies a pattern as anchored and/or complex.
use std::borrow::Cow;

use regex_syntax::ast::{
    parse::Parser, Assertion, AssertionKind, Ast, Repetition, RepetitionKind, RepetitionRange,
};

/// Failure to parse a pattern for analysis.
#[derive(Debug, thiserror::Error)]
#[error("Unable to analyze pattern '{pattern}': {source}")]
pub struct Error {
    pattern: String,
    #[source]
    source: Box<regex_syntax::ast::Error>,
}

/// Shape of a pattern, as far as backtracking cost and anchoring are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternInfo {
    /// The pattern starts with `^`.
    pub anchored_start: bool,
    /// The pattern ends with `$`.
    pub anchored_end: bool,
    /// Number of quantifiers with a variable repetition count (`*`, `+`, `{n,}`, `{n,m}`).
    pub variable_quantifiers: usize,
    /// Some quantifier applies directly to a group, e.g. `(a|b)*`.
    pub quantified_group: bool,
}

impl PatternInfo {
    /// Anchored on both ends.
    #[must_use]
    pub fn is_anchored(&self) -> bool {
        self.anchored_start && self.anchored_end
    }

    /// Whether the pattern may backtrack badly on long inputs.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.variable_quantifiers > 1 || self.quantified_group
    }
}

/// Classify `pattern`.
///
/// # Errors
///
/// Fails if the pattern uses syntax the analyzer can not parse (e.g. look-around).
pub fn analyze(pattern: &str) -> Result<PatternInfo, Error> {
    let translated = translate(pattern);
    let ast = Parser::new().parse(&translated).map_err(|source| Error {
        pattern: pattern.to_string(),
        source: Box::new(source),
    })?;
    let mut info = PatternInfo::default();
    let top: &[Ast] = match &ast {
        Ast::Concat(concat) => &concat.asts,
        other => std::slice::from_ref(other),
    };
    info.anchored_start = top.first().is_some_and(|ast| is_assertion(ast, true));
    info.anchored_end = top.last().is_some_and(|ast| is_assertion(ast, false));
    walk(&ast, &mut info);
    Ok(info)
}

fn is_assertion(ast: &Ast, start: bool) -> bool {
    match ast {
        Ast::Assertion(assertion) => {
            let Assertion { kind, .. } = &**assertion;
            if start {
                matches!(kind, AssertionKind::StartLine | AssertionKind::StartText)
            } else {
                matches!(kind, AssertionKind::EndLine | AssertionKind::EndText)
            }
        }
        _ => false,
    }
}

fn walk(ast: &Ast, info: &mut PatternInfo) {
    match ast {
        Ast::Repetition(repetition) => {
            let Repetition { op, ast: inner, .. } = &**repetition;
            let variable = match &op.kind {
                RepetitionKind::ZeroOrOne
                | RepetitionKind::Range(RepetitionRange::Exactly(_)) => false,
                RepetitionKind::ZeroOrMore
                | RepetitionKind::OneOrMore
                | RepetitionKind::Range(
                    RepetitionRange::AtLeast(_) | RepetitionRange::Bounded(_, _),
                ) => true,
            };
            if variable {
                info.variable_quantifiers += 1;
            }
            if matches!(&**inner, Ast::Group(_))
                && !matches!(op.kind, RepetitionKind::Range(RepetitionRange::Exactly(_)))
            {
                info.quantified_group = true;
            }
            walk(inner, info);
        }
        Ast::Group(group) => walk(&group.ast, info),
        Ast::Concat(concat) => concat.asts.iter().for_each(|ast| walk(ast, info)),
        Ast::Alternation(alternation) => alternation.asts.iter().for_each(|ast| walk(ast, info)),
        _ => {}
    }
}

/// Rewrite ECMA-262 specific escapes into their Rust-regex equivalents.
///
/// `\d` and `\w` are ASCII-only in ECMA-262 but Unicode-aware in Rust; `\cX` control escapes do
/// not exist in Rust.
#[must_use]
pub fn translate(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains(&['\\', '['][..]) {
        return Cow::Borrowed(pattern);
    }
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('d') if in_class => out.push_str("0-9"),
                Some('w') if in_class => out.push_str("A-Za-z0-9_"),
                Some('d') => out.push_str("[0-9]"),
                Some('D') if !in_class => out.push_str("[^0-9]"),
                Some('w') => out.push_str("[A-Za-z0-9_]"),
                Some('W') if !in_class => out.push_str("[^A-Za-z0-9_]"),
                Some('c') => match chars.peek().copied() {
                    Some(letter) if letter.is_ascii_alphabetic() => {
                        chars.next();
                        let code = (letter as u32) % 32;
                        out.push_str(&format!("\\x{{{code:02X}}}"));
                    }
                    _ => out.push_str("\\\\c"),
                },
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '[' if !in_class => {
                in_class = true;
                out.push(ch);
                // A leading `]` or `^]` is literal and does not close the class.
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    out.push_str("\\]");
                    chars.next();
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
