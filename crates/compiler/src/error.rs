//! Compiler diagnostics: one error shape shared by every phase (§4.4.4, §7).

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Io,
    Lex,
    Parse,
    Semantic,
    Codegen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileError {
    pub phase: Phase,
    pub line: u32,
    pub filename: String,
    pub message: String,
}

impl CompileError {
    pub fn new(phase: Phase, filename: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        CompileError { phase, line, filename: filename.into(), message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.filename, self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Accumulates diagnostics across a phase that must "run to completion"
/// rather than stop at the first error (§4.4.4, §7 reporting policy).
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, err: CompileError) {
        self.errors.push(err);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CompileError> {
        self.errors
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }
}

/// Renders a phase's accumulated errors as a JSON array, one object per
/// diagnostic (`--emit-diagnostics=json`). Falls back to an empty array
/// literal if serialization somehow fails rather than panicking the driver
/// over a debugging aid.
pub fn errors_to_json(errors: &[CompileError]) -> String {
    serde_json::to_string_pretty(errors).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_to_json_round_trips_fields() {
        let errs = vec![CompileError::new(Phase::Semantic, "t.sn", 3, "unknown identifier 'x'")];
        let json = errors_to_json(&errs);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["phase"], "semantic");
        assert_eq!(parsed[0]["line"], 3);
        assert_eq!(parsed[0]["filename"], "t.sn");
        assert_eq!(parsed[0]["message"], "unknown identifier 'x'");
    }

    #[test]
    fn errors_to_json_empty_is_empty_array() {
        assert_eq!(errors_to_json(&[]), "[]");
    }
}
