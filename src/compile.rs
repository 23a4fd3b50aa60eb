//! End-to-end compilation: source text in, integer code buffer out.
//! Diagnostics flow through the caller's sink, not the return value.

use std::fmt;

use crate::lexer::Lexer;
use crate::names::NameTable;
use crate::parser::Parser;
use crate::report::{DiagnosticSink, Reporter};

/// Compilation reported at least one error; the diagnostics went to the
/// sink and no code was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileFailed;

impl fmt::Display for CompileFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("compilation failed")
    }
}

impl std::error::Error for CompileFailed {}

pub fn compile_source(
    source: &str,
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<i64>, CompileFailed> {
    let mut names = NameTable::new();
    let tokens = Lexer::new(source, &mut names).tokenize();
    let reporter = Reporter::new(sink);
    Parser::new(tokens, reporter).run().ok_or(CompileFailed)
}
