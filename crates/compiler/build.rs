//! Build script for sn-compiler.
//!
//! Locates the sn-runtime static library produced by the sibling `sn-runtime`
//! crate so it can be embedded into the compiler binary via `include_bytes!`.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    if cfg!(feature = "docsrs") {
        println!("cargo:rustc-env=SN_RUNTIME_LIB_PATH=");
        return;
    }

    verify_runtime_version();
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // OUT_DIR = target/<profile>/build/sn-compiler-<hash>/out; the sibling
    // staticlib sits two levels up, either directly in <profile>/ or in
    // <profile>/deps/ with a hash suffix appended by cargo.
    let target_dir = out_dir
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .expect("could not find target directory from OUT_DIR");

    let direct_lib = target_dir.join("libsn_runtime.a");
    let runtime_lib = if direct_lib.exists() {
        direct_lib
    } else {
        let deps_dir = target_dir.join("deps");
        find_runtime_in_deps(&deps_dir).unwrap_or_else(|| {
            panic!(
                "sn-runtime static library not found.\nLooked in: {}\nAnd deps: {}\nOUT_DIR was: {}",
                direct_lib.display(),
                deps_dir.display(),
                out_dir.display()
            )
        })
    };

    println!("cargo:rustc-env=SN_RUNTIME_LIB_PATH={}", runtime_lib.display());
    println!("cargo:rerun-if-changed={}", runtime_lib.display());
}

fn find_runtime_in_deps(deps_dir: &PathBuf) -> Option<PathBuf> {
    if !deps_dir.exists() {
        return None;
    }
    fs::read_dir(deps_dir).ok()?.find_map(|entry| {
        let entry = entry.ok()?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("libsn_runtime") && name_str.ends_with(".a") {
            Some(entry.path())
        } else {
            None
        }
    })
}

/// The embedded runtime must match the compiler's own version exactly, so a
/// published `sn-compiler` always embeds the `sn-runtime` it was tested
/// against.
fn verify_runtime_version() {
    let compiler_version = env!("CARGO_PKG_VERSION");
    let cargo_toml = fs::read_to_string("Cargo.toml").expect("failed to read compiler/Cargo.toml");

    let runtime_version = cargo_toml
        .lines()
        .find(|line| line.contains("sn-runtime") && line.contains("version"))
        .and_then(|line| line.split("version = \"").nth(1))
        .and_then(|s| s.split('"').next())
        .expect("could not find sn-runtime version in Cargo.toml");
    let runtime_version = runtime_version.trim_start_matches('=');

    if compiler_version != runtime_version {
        panic!(
            "version mismatch: sn-compiler {compiler_version} vs sn-runtime {runtime_version}; \
             pin Cargo.toml's sn-runtime dependency to version = \"={compiler_version}\""
        );
    }
}
