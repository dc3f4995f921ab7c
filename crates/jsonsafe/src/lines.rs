//! Indentation-aware accumulator for the validator listing.
use crate::{
    primitives::Primitive,
    template::{SafeCode, TemplateError},
};

const INDENT: &str = "  ";

/// Position of an opened block, used to retract it when nothing was written inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockMark(usize);

#[derive(Debug, Default, Clone)]
pub(crate) struct Lines {
    lines: Vec<String>,
    indent: usize,
}

fn opens_block(line: &str) -> bool {
    line.ends_with(&['{', '[', '('][..])
}

fn closes_block(line: &str) -> bool {
    line.starts_with(&['}', ']', ')'][..])
}

impl Lines {
    pub(crate) fn new() -> Self {
        Lines::default()
    }

    /// Append a single statement.
    pub(crate) fn write(&mut self, line: &SafeCode) -> Result<(), TemplateError> {
        let line = line.as_str().trim();
        if line.contains('\n') {
            return Err(TemplateError::MultiLine);
        }
        if closes_block(line) {
            self.indent = self.indent.saturating_sub(1);
        }
        self.lines.push(format!("{}{line}", INDENT.repeat(self.indent)));
        if opens_block(line) {
            self.indent += 1;
        }
        Ok(())
    }

    /// Write the opening line of a block and remember where it starts.
    fn open(&mut self, line: &SafeCode) -> Result<BlockMark, TemplateError> {
        let mark = BlockMark(self.lines.len());
        self.write(line)?;
        Ok(mark)
    }

    /// Close the block opened at `mark`. An empty block is removed along with its opening line.
    fn close(&mut self, mark: BlockMark, line: &SafeCode) -> Result<(), TemplateError> {
        if self.lines.len() == mark.0 + 1 {
            if let Some(opening) = self.lines.pop() {
                if opens_block(opening.trim_start()) {
                    self.indent = self.indent.saturating_sub(1);
                }
            }
            Ok(())
        } else {
            self.write(line)
        }
    }

    /// `open` + `body` + `close`.
    pub(crate) fn block<E>(
        &mut self,
        open: &SafeCode,
        close: &SafeCode,
        body: impl FnOnce(&mut Lines) -> Result<(), E>,
    ) -> Result<(), E>
    where
        E: From<TemplateError>,
    {
        let mark = self.open(open)?;
        body(self)?;
        self.close(mark, close)?;
        Ok(())
    }

    /// Append all lines of `other` at the current indentation level.
    pub(crate) fn extend(&mut self, other: &Lines) {
        let prefix = INDENT.repeat(self.indent);
        self.lines
            .extend(other.lines.iter().map(|line| format!("{prefix}{line}")));
    }

    /// The flat listing.
    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// The listing as a self-contained module: constant bindings, primitive imports and the body
    /// wrapped in an immediately invoked function.
    pub(crate) fn module(
        &self,
        constants: &[(SafeCode, SafeCode)],
        primitives: &[Primitive],
    ) -> String {
        let mut out = String::new();
        for primitive in primitives {
            out.push_str("const ");
            out.push_str(primitive.name());
            out.push_str(" = require(\"jsonsafe/primitives\").");
            out.push_str(primitive.name());
            out.push_str(";\n");
        }
        for (name, value) in constants {
            out.push_str("const ");
            out.push_str(name.as_str());
            out.push_str(" = ");
            out.push_str(value.as_str());
            out.push_str(";\n");
        }
        out.push_str("(function () {\n");
        for line in self.render().lines() {
            out.push_str(INDENT);
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("})()\n");
        out
    }
}
