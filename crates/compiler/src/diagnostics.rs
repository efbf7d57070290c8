//! Verbosity-gated logging for the driver (spec.md §6 `-l`/`-v`).
//!
//! Call sites read `logger.info("...")` instead of hand-rolled level checks,
//! in the spirit of the Sindarin driver's `init_debug`/`DEBUG_ERROR` macros.
//! No `tracing` dependency here: the compiler binary sticks to the plain
//! `println!`/`eprintln!` convention the host workspace uses for its own
//! CLI, reserving structured logging for the generated runtime's own
//! ambient stack.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    None = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Verbose = 4,
}

impl Level {
    pub fn from_u8(n: u8) -> Option<Level> {
        match n {
            0 => Some(Level::None),
            1 => Some(Level::Error),
            2 => Some(Level::Warning),
            3 => Some(Level::Info),
            4 => Some(Level::Verbose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Logger {
    level: Level,
}

impl Logger {
    pub fn new(level: Level) -> Self {
        Logger { level }
    }

    pub fn error(&self, msg: impl std::fmt::Display) {
        if self.level >= Level::Error {
            eprintln!("error: {msg}");
        }
    }

    pub fn warning(&self, msg: impl std::fmt::Display) {
        if self.level >= Level::Warning {
            eprintln!("warning: {msg}");
        }
    }

    pub fn info(&self, msg: impl std::fmt::Display) {
        if self.level >= Level::Info {
            println!("{msg}");
        }
    }

    pub fn verbose(&self, msg: impl std::fmt::Display) {
        if self.level >= Level::Verbose {
            println!("[verbose] {msg}");
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(Level::Warning)
    }
}
