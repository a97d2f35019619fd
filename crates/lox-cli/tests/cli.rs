//! End-to-end runs of the `lox` binary.

use std::{fs, path::Path, process::Command};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn lox(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_lox"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn lox");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8(output.stdout).unwrap(),
        String::from_utf8(output.stderr).unwrap(),
    )
}

fn script(dir: &TempDir, name: &str, text: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn run_prints_the_result() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "ok.lox", "(-1.2 + 3.4) / 5.6\n");
    assert_eq!(lox(&["run", &file]), (0, "0.392857\n".into(), String::new()));
}

#[test]
fn compile_error_exits_65() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "bad.lox", "1 +\n");
    let (code, out, err) = lox(&["run", &file]);
    assert_eq!(code, 65);
    assert_eq!(out, "");
    assert_eq!(err, "[line 2] Error at end: Expect expression.\n");
}

#[test]
fn runtime_error_exits_70() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "neg.lox", "\n-true\n");
    let (code, out, err) = lox(&["run", &file]);
    assert_eq!(code, 70);
    assert_eq!(out, "");
    assert_eq!(err, "Operand must be a number.\n[line 2] in script\n");
}

#[test]
fn assembler_listing_runs() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "neg.asm", "TRUE\nNEGATE\nRETURN\n");
    let (code, _, err) = lox(&["run", "--asm", &file]);
    assert_eq!(code, 70);
    assert!(err.contains("must be a number"));
}

#[test]
fn missing_file_exits_1() {
    let (code, _, err) = lox(&["run", "/definitely/not/here.lox"]);
    assert_eq!(code, 1);
    assert!(err.starts_with("error:"));
}

#[test]
fn disasm_writes_compact_listing_to_file() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "sum.lox", "1 + 2");
    let out_path = dir.path().join("sum.txt");
    let out_arg = out_path.to_string_lossy().into_owned();

    let (code, stdout, _) = lox(&["disasm", "--compact", &file, "-o", &out_arg]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "");
    assert_eq!(
        fs::read_to_string(Path::new(&out_arg)).unwrap(),
        "0000: OP_CONSTANT         0 '1'\n\
         0002: OP_CONSTANT         1 '2'\n\
         0004: OP_ADD\n\
         0005: OP_RETURN\n"
    );
}

#[test]
fn disasm_listing_uses_file_name_as_header() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "t.lox", "nil");
    let (code, stdout, _) = lox(&["disasm", &file]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "== t.lox ==\n0000    1 OP_NIL\n0001    | OP_RETURN\n");
}

#[test]
fn tokens_are_grouped_by_line() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "t.lox", "print 1;\nvar x = \"s\";\n");
    let (code, stdout, _) = lox(&["tokens", &file]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "   1: print 1 ;\n   2: var x = \"s\" ;\n");
}
