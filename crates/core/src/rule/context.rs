use crate::finding::Location;
use crate::parser::{ContractTopology, FunctionSignature, ScannedSource, SourceLine};

/// Provides rules with access to the line scan and the parsed topology.
pub struct RuleContext<'a> {
    pub topology: &'a ContractTopology,
    scanned: &'a ScannedSource<'a>,
}

impl<'a> RuleContext<'a> {
    pub fn new(scanned: &'a ScannedSource<'a>, topology: &'a ContractTopology) -> Self {
        Self { topology, scanned }
    }

    pub fn file(&self) -> &str {
        &self.topology.file_name
    }

    pub fn lines(&self) -> &[SourceLine<'a>] {
        &self.scanned.lines
    }

    /// Get a line by 1-based number
    pub fn line(&self, number: usize) -> Option<&SourceLine<'a>> {
        self.scanned.line(number)
    }

    pub fn enclosing_function(&self, line: usize) -> Option<&'a FunctionSignature> {
        self.topology.function_at(line)
    }

    /// Lines from a function's declaration through the closing brace of its body
    pub fn function_lines(&self, function: &FunctionSignature) -> &[SourceLine<'a>] {
        let start = function.line.saturating_sub(1).min(self.scanned.lines.len());
        let end = function.end_line.min(self.scanned.lines.len()).max(start);
        &self.scanned.lines[start..end]
    }

    /// Single-line location with enclosing function and snippet filled in
    pub fn location(&self, line: usize) -> Location {
        self.span_location(line, line)
    }

    pub fn span_location(&self, start_line: usize, end_line: usize) -> Location {
        let mut location = Location::span(self.file(), start_line, end_line);
        location.function = self.enclosing_function(start_line).map(|f| f.name.clone());
        location.snippet = self
            .scanned
            .snippet(start_line, end_line)
            .map(|s| s.trim().to_string());
        location
    }
}
