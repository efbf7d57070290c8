//! End-to-end scenarios (spec §8): source in, compiled and run, stdout/exit
//! checked. Each test writes a `.sn` fixture to a temp directory, compiles
//! it with the host C compiler, runs the resulting executable, and asserts
//! on its output.

use snc::config::ArithmeticMode;
use snc::optimizer::OptLevel;
use snc::CompilerConfig;
use std::path::Path;
use std::process::Command;

fn run_scenario(name: &str, source: &str) -> (i32, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let src_path = dir.path().join(format!("{name}.sn"));
    std::fs::write(&src_path, source).expect("write source");
    let exe_path = dir.path().join(name);

    let config = CompilerConfig::new(src_path, exe_path.clone())
        .with_opt_level(OptLevel::Basic)
        .with_arithmetic(ArithmeticMode::Checked)
        .with_keep_c(true);

    snc::compile_file(&config).unwrap_or_else(|e| panic!("compiling {name} failed: {e}"));

    let output = Command::new(&exe_path).output().unwrap_or_else(|e| panic!("running {name} failed: {e}"));
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    (code, stdout)
}

fn expect_compile_error(name: &str, source: &str) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let src_path = dir.path().join(format!("{name}.sn"));
    std::fs::write(&src_path, source).expect("write source");
    let base_dir = src_path.parent().unwrap_or_else(|| Path::new("."));
    let config = CompilerConfig::new(src_path.clone(), dir.path().join(name));

    let content = std::fs::read_to_string(&src_path).unwrap();
    match snc::compile_source(&content, name, base_dir, &config) {
        Ok(_) => panic!("expected {name} to fail to compile"),
        Err(errs) => errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"),
    }
}

#[test]
fn arrays_sum_survives_reverse() {
    let src = r#"
fn main() => {
    var xs = range(0, 1000000)
    var s1 = xs.sum()
    xs.reverse()
    var s2 = xs.sum()
    print(s1)
    print(s2)
}
"#;
    let (code, stdout) = run_scenario("arrays", src);
    assert_eq!(code, 0);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["499999500000", "499999500000"]);
}

#[test]
fn struct_defaults_and_nesting() {
    let src = r#"
struct Point { x: double = 0.0, y: double = 0.0 }
struct Rect { o: Point, s: Point }

fn main() => {
    var r = Rect { o: Point{ x: 1.0 }, s: Point{} }
    print(r.o.x, r.o.y, r.s.x, r.s.y)
}
"#;
    let (code, stdout) = run_scenario("struct_defaults", src);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1 0 0 0");
}

#[test]
fn compile_file_diagnostics_carries_structured_errors_for_json_rendering() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src_path = dir.path().join("bad.sn");
    std::fs::write(&src_path, "struct N { v: int, n: N }\n\nfn main() => {\n    print(0)\n}\n")
        .expect("write source");
    let config = CompilerConfig::new(src_path, dir.path().join("bad"));

    let failure = snc::compile_file_diagnostics(&config).expect_err("expected a compile failure");
    let errs = failure.diagnostics().expect("expected structured diagnostics, not a plain message");
    assert!(!errs.is_empty());

    let json = snc::error::errors_to_json(errs);
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    assert!(parsed.as_array().is_some_and(|a| !a.is_empty()));
    assert!(parsed[0]["message"].as_str().unwrap().contains('N'));
}

#[test]
fn circular_struct_without_pointer_fails_compilation() {
    let src = r#"
struct N { v: int, n: N }

fn main() => {
    print(0)
}
"#;
    let msg = expect_compile_error("circular", src);
    assert!(msg.contains('N'), "error should name the struct on the cycle: {msg}");
}

#[test]
fn circular_struct_broken_by_pointer_compiles() {
    let src = r#"
struct N { v: int, n: *N }

fn main() => {
    print(0)
}
"#;
    let (code, _stdout) = run_scenario("not_circular", src);
    assert_eq!(code, 0);
}

#[test]
fn closure_mutation_persists_across_calls() {
    let src = r#"
fn main() => {
    var count = 0
    var inc = fn() => count = count + 1
    inc()
    inc()
    inc()
    print(count)
}
"#;
    let (code, stdout) = run_scenario("closure_mutation", src);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");
}

#[test]
fn local_string_escapes_into_outer_struct() {
    let src = r#"
struct Box { s: str }

fn main() => {
    var b = Box { s: "" }
    {
        var local = "hello"
        b.s = local
    }
    print(b.s)
}
"#;
    let (code, stdout) = run_scenario("escape", src);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "hello");
}

#[test]
fn match_expression_selects_weekday_arm() {
    let src = r#"
fn main() => {
    var day = 3
    var name = match day => 1 | 2 | 3 | 4 | 5 => "weekday" else => "weekend"
    print(name)
}
"#;
    let (code, stdout) = run_scenario("match_weekday", src);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "weekday");
}
