//! SN: a statically-typed source-to-C compiler built around the Handle ABI
//! arena/runtime contract (spec.md §1). This crate implements lexing
//! through code generation (§4.1–§4.7); [`main`](../bin.snc.html) drives the
//! end-to-end `.sn` → executable pipeline described in §6.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod symtab;
pub mod token;
pub mod typechecker;
pub mod types;

pub use config::{ArithmeticMode, CompilerConfig};
pub use error::{CompileError, Phase};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Embedded runtime static library, built by `build.rs` from the sibling
/// `sn-runtime` crate and linked into every generated executable.
#[cfg(not(feature = "docsrs"))]
static RUNTIME_LIB: &[u8] = include_bytes!(env!("SN_RUNTIME_LIB_PATH"));

#[cfg(feature = "docsrs")]
static RUNTIME_LIB: &[u8] = &[];

/// Resolves `import "path"` targets relative to the importing file's
/// directory, tracking visited paths so the parser's own cycle guard has
/// real file contents to compare (spec.md §4.1 import resolution).
pub struct FileModuleResolver {
    base_dir: PathBuf,
}

impl FileModuleResolver {
    pub fn new(base_dir: PathBuf) -> Self {
        FileModuleResolver { base_dir }
    }
}

impl parser::ModuleResolver for FileModuleResolver {
    fn resolve(&mut self, path: &str) -> Result<String, String> {
        let full = self.base_dir.join(path);
        fs::read_to_string(&full).map_err(|e| format!("cannot read import '{}': {e}", full.display()))
    }
}

/// Lexes, parses, type-checks, optimizes, and generates C for `source`.
/// Returns the generated C translation unit as a string, or the first
/// phase's accumulated diagnostics.
pub fn compile_source(
    source: &str,
    filename: &str,
    base_dir: &Path,
    config: &CompilerConfig,
) -> Result<String, Vec<CompileError>> {
    let logger = config.logger();

    logger.verbose(format!("lexing {filename}"));
    let lexer = lexer::Lexer::new(source, filename);
    let (tokens, lex_errors) = lexer.tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }

    logger.verbose("parsing");
    let mut resolver = FileModuleResolver::new(base_dir.to_path_buf());
    let parser = parser::Parser::new(tokens, filename, Some(&mut resolver));
    let (mut module, parse_errors) = parser.parse_module();
    if !parse_errors.is_empty() {
        return Err(parse_errors);
    }

    logger.verbose("type checking");
    let checker = typechecker::TypeChecker::new(filename);
    checker.check(&mut module)?;

    logger.verbose(format!("optimizing at {:?}", config.opt_level));
    let stats = optimizer::Optimizer::new(config.opt_level).run(&mut module);
    logger.verbose(format!(
        "optimizer: {} statements removed, {} variables removed, {} no-ops simplified",
        stats.statements_removed, stats.variables_removed, stats.no_ops_simplified
    ));

    logger.verbose("generating C");
    codegen::emit_program(&module, config.checked_arithmetic())
        .map_err(|e| vec![CompileError::new(Phase::Codegen, filename, 0, e.to_string())])
}

/// A compile-file failure, distinguishing structured per-phase diagnostics
/// (which `--emit-diagnostics=json` can render as JSON) from plain I/O or
/// toolchain-invocation failures that never had a `CompileError` to begin
/// with.
#[derive(Debug)]
pub enum CompileFailure {
    Diagnostics(Vec<CompileError>),
    Message(String),
}

impl std::fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileFailure::Diagnostics(errs) => {
                write!(f, "{}", errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))
            }
            CompileFailure::Message(msg) => write!(f, "{msg}"),
        }
    }
}

impl CompileFailure {
    /// Accumulated `CompileError`s, if this failure came from a compiler
    /// phase rather than an I/O or toolchain-invocation error.
    pub fn diagnostics(&self) -> Option<&[CompileError]> {
        match self {
            CompileFailure::Diagnostics(errs) => Some(errs),
            CompileFailure::Message(_) => None,
        }
    }
}

/// Compiles a source file per `config`, writing the intermediate C file and,
/// unless `--emit-c` was requested, invoking the host C compiler to produce
/// an executable (spec.md §6). Structured diagnostics survive on the error
/// path so callers (the `snc` driver's `--emit-diagnostics=json`) can render
/// them as JSON instead of the plain-text `Display` form.
pub fn compile_file_diagnostics(config: &CompilerConfig) -> Result<(), CompileFailure> {
    let logger = config.logger();
    let source = fs::read_to_string(&config.source_path).map_err(|e| {
        CompileFailure::Message(format!("failed to read '{}': {e}", config.source_path.display()))
    })?;
    let filename = config.source_path.to_string_lossy().to_string();
    let base_dir = config.source_path.parent().unwrap_or_else(|| Path::new("."));

    let c_code =
        compile_source(&source, &filename, base_dir, config).map_err(CompileFailure::Diagnostics)?;

    let c_path = config.c_file_path();
    fs::write(&c_path, &c_code)
        .map_err(|e| CompileFailure::Message(format!("failed to write '{}': {e}", c_path.display())))?;
    logger.info(format!("wrote {}", c_path.display()));

    if config.emit_c_only {
        return Ok(());
    }

    let runtime_path = std::env::temp_dir().join("libsn_runtime.a");
    fs::write(&runtime_path, RUNTIME_LIB)
        .map_err(|e| CompileFailure::Message(format!("failed to stage runtime lib: {e}")))?;

    let mut cc = Command::new(&config.cc);
    cc.arg(&c_path).arg("-o").arg(&config.output_path);
    cc.arg(if config.debug_build { "-g" } else { "-O2" });
    cc.arg("-L").arg(runtime_path.parent().unwrap());
    cc.arg("-l").arg("sn_runtime");
    cc.arg("-lpthread");

    logger.verbose(format!("invoking {:?}", cc));
    let output = cc
        .output()
        .map_err(|e| CompileFailure::Message(format!("failed to run '{}': {e}", config.cc)))?;
    fs::remove_file(&runtime_path).ok();

    if !output.status.success() {
        return Err(CompileFailure::Message(format!(
            "{} failed:\n{}",
            config.cc,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    if !config.keep_c {
        fs::remove_file(&c_path).ok();
    }

    logger.info(format!("compiled {} -> {}", config.source_path.display(), config.output_path.display()));
    Ok(())
}

/// Compiles a source file per `config`; plain-text `String` error form of
/// [`compile_file_diagnostics`], kept for callers that don't need structured
/// diagnostics.
pub fn compile_file(config: &CompilerConfig) -> Result<(), String> {
    compile_file_diagnostics(config).map_err(|e| e.to_string())
}

