//! `snc` — the SN compiler driver (spec.md §6).
//!
//! Flag parsing is two-pass, matching the Sindarin driver this is developed
//! in the style of: `clap` resolves the bulk of the flag set (it does not
//! care about argv order), then a second pass walks raw argv to resolve the
//! order-sensitive arithmetic-mode rule ("`-O2` implies `unchecked` unless
//! the user re-specifies `--checked` afterward; otherwise later flag
//! wins").

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{generate, Shell};
use snc::config::ArithmeticMode;
use snc::diagnostics::Level;
use snc::optimizer::OptLevel;
use snc::CompilerConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "snc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SN compiler - compile .sn programs to C and executables", long_about = None)]
struct Cli {
    /// Input .sn source file
    input: Option<PathBuf>,

    /// Executable output path (or C output path under --emit-c)
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Stop after generating C; do not invoke the C compiler
    #[arg(long)]
    emit_c: bool,

    /// Retain the intermediate C file after successful compilation
    #[arg(long)]
    keep_c: bool,

    /// Verbose progress logging
    #[arg(short = 'v')]
    verbose: bool,

    /// Debug build (passes debug flags to the C compiler)
    #[arg(short = 'g')]
    debug: bool,

    /// Log level 0..4 (none/error/warning/info/verbose)
    #[arg(short = 'l', value_name = "N")]
    log_level: Option<u8>,

    /// Force checked arithmetic
    #[arg(long)]
    checked: bool,

    /// Force unchecked arithmetic
    #[arg(long)]
    unchecked: bool,

    /// Optimization level (0, 1, or 2)
    #[arg(short = 'O', value_name = "LEVEL")]
    opt: Option<u8>,

    /// Legacy alias for -O0
    #[arg(long)]
    no_opt: bool,

    /// Generate a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Emit diagnostics as a JSON array on failure instead of plain text
    /// (only "json" is accepted)
    #[arg(long, value_name = "FORMAT")]
    emit_diagnostics: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "snc", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let Some(input) = cli.input.clone() else {
        eprintln!("error: missing source file");
        Cli::command().print_help().ok();
        return ExitCode::from(2);
    };

    let output = cli.output.clone().unwrap_or_else(|| {
        if cli.emit_c {
            input.with_extension("c")
        } else {
            let stem = input.file_stem().unwrap_or_default();
            PathBuf::from(stem)
        }
    });

    let log_level = match cli.log_level {
        Some(n) => match Level::from_u8(n) {
            Some(l) => l,
            None => {
                eprintln!("error: invalid log level '{n}' (expected 0..4)");
                return ExitCode::from(2);
            }
        },
        None if cli.verbose => Level::Verbose,
        None => Level::Warning,
    };

    let opt_level = match cli.opt {
        Some(0) => OptLevel::None,
        Some(1) => OptLevel::Basic,
        Some(2) => OptLevel::Full,
        Some(n) => {
            eprintln!("error: invalid optimization level '-O{n}' (expected 0, 1, or 2)");
            return ExitCode::from(2);
        }
        None if cli.no_opt => OptLevel::None,
        None => OptLevel::Basic,
    };

    let arithmetic = resolve_arithmetic_mode(opt_level);

    let config = CompilerConfig::new(input, output)
        .with_emit_c_only(cli.emit_c)
        .with_keep_c(cli.keep_c)
        .with_verbose(cli.verbose)
        .with_debug_build(cli.debug)
        .with_log_level(log_level)
        .with_opt_level(opt_level)
        .with_arithmetic(arithmetic);

    if let Some(format) = cli.emit_diagnostics.as_deref() {
        if format != "json" {
            eprintln!("error: unsupported --emit-diagnostics format '{format}' (expected 'json')");
            return ExitCode::from(2);
        }
    }

    match snc::compile_file_diagnostics(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            if cli.emit_diagnostics.is_some() {
                if let Some(errs) = failure.diagnostics() {
                    eprintln!("{}", snc::error::errors_to_json(errs));
                    return ExitCode::FAILURE;
                }
            }
            eprintln!("error: {failure}");
            ExitCode::FAILURE
        }
    }
}

/// Walks raw argv (not the clap-parsed `Cli`, which discards occurrence
/// order) to apply spec.md §6's order-sensitive rule: `-O2` sets arithmetic
/// to `unchecked` unless `--checked` appears later on the command line;
/// absent `-O2`, the last of `--checked`/`--unchecked` to appear wins, and
/// the default is `checked`.
fn resolve_arithmetic_mode(opt_level: OptLevel) -> ArithmeticMode {
    let mut mode = if opt_level == OptLevel::Full {
        ArithmeticMode::Unchecked
    } else {
        ArithmeticMode::Checked
    };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--checked" => mode = ArithmeticMode::Checked,
            "--unchecked" => mode = ArithmeticMode::Unchecked,
            _ => {}
        }
    }
    mode
}
