//! Compiler configuration (spec.md §6), threaded explicitly through the
//! pipeline as an owned value rather than read from globals — the
//! `CompilerConfig` here plays the same role as the host workspace's own
//! `config.rs`, built once by the driver and passed by reference to every
//! phase that needs it.

use crate::optimizer::OptLevel;
use std::path::PathBuf;

/// Integer `+ - *` code-generation strategy (division/modulo are always
/// checked regardless of this setting). Default is `Checked`; `-O2` implies
/// `Unchecked` unless the user re-specifies `--checked` afterward on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticMode {
    Checked,
    Unchecked,
}

impl Default for ArithmeticMode {
    fn default() -> Self {
        ArithmeticMode::Checked
    }
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub emit_c_only: bool,
    pub keep_c: bool,
    pub verbose: bool,
    pub debug_build: bool,
    pub log_level: crate::diagnostics::Level,
    pub arithmetic: ArithmeticMode,
    pub opt_level: OptLevel,
    pub cc: String,
}

impl CompilerConfig {
    pub fn new(source_path: PathBuf, output_path: PathBuf) -> Self {
        CompilerConfig {
            source_path,
            output_path,
            emit_c_only: false,
            keep_c: false,
            verbose: false,
            debug_build: false,
            log_level: crate::diagnostics::Level::Warning,
            arithmetic: ArithmeticMode::Checked,
            opt_level: OptLevel::Basic,
            cc: find_c_compiler(),
        }
    }

    pub fn with_emit_c_only(mut self, v: bool) -> Self {
        self.emit_c_only = v;
        self
    }

    pub fn with_keep_c(mut self, v: bool) -> Self {
        self.keep_c = v;
        self
    }

    pub fn with_verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }

    pub fn with_debug_build(mut self, v: bool) -> Self {
        self.debug_build = v;
        self
    }

    pub fn with_log_level(mut self, level: crate::diagnostics::Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_arithmetic(mut self, mode: ArithmeticMode) -> Self {
        self.arithmetic = mode;
        self
    }

    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    pub fn checked_arithmetic(&self) -> bool {
        self.arithmetic == ArithmeticMode::Checked
    }

    /// Intermediate C file path, derived from `output_path` when `-o` names
    /// an executable (spec.md §6 derivation rules), or `output_path` itself
    /// under `--emit-c`.
    pub fn c_file_path(&self) -> PathBuf {
        if self.emit_c_only {
            self.output_path.clone()
        } else {
            self.output_path.with_extension("c")
        }
    }

    pub fn logger(&self) -> crate::diagnostics::Logger {
        crate::diagnostics::Logger::new(self.log_level)
    }
}

/// Picks whichever of `cc`/`gcc`/`clang` is first found on `PATH`. The
/// driver shells out to it and surfaces its exit status without validating
/// its version (spec.md names no C-dialect requirement, unlike the host
/// workspace's LLVM-version check for its own backend).
fn find_c_compiler() -> String {
    for candidate in ["cc", "gcc", "clang"] {
        if which(candidate) {
            return candidate.to_string();
        }
    }
    "cc".to_string()
}

fn which(program: &str) -> bool {
    let path = match std::env::var_os("PATH") {
        Some(p) => p,
        None => return false,
    };
    std::env::split_paths(&path).any(|dir| dir.join(program).is_file())
}
