//! Codegen-phase errors: unsupported element type for an array operation is
//! the one fatal case named in §7; everything upstream has already been
//! rejected by the type checker.

use std::fmt;

#[derive(Debug, Clone)]
pub struct CodeGenError {
    pub message: String,
}

impl CodeGenError {
    pub fn new(message: impl Into<String>) -> Self {
        CodeGenError { message: message.into() }
    }
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codegen error: {}", self.message)
    }
}

impl std::error::Error for CodeGenError {}
