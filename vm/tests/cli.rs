use std::path::PathBuf;
use std::process::{Command, Output};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../demos")
        .join(name)
}

fn poplar(args: &[&str], file: &PathBuf) -> Output {
    Command::new(env!("CARGO_BIN_EXE_poplar"))
        .args(args)
        .arg(file)
        .env("RUST_LOG", "off")
        .output()
        .expect("poplar runs")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

/// Writes `source` to a scratch file unique to `name`.
fn scratch_program(name: &str, source: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("poplar-{}-{name}.som", std::process::id()));
    std::fs::write(&path, source).expect("write scratch program");
    path
}

#[test]
fn hello() {
    let out = poplar(&[], &demo("hello.som"));
    assert_eq!(stdout(&out), "Hello, world!\n");
    assert!(stderr(&out).is_empty(), "{}", stderr(&out));
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn fib() {
    let out = poplar(&[], &demo("fib.som"));
    assert_eq!(stdout(&out), "0 1 1 2 3 5 8 13 21 34 55 \n6765\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn classes() {
    let out = poplar(&[], &demo("classes.som"));
    assert_eq!(
        stdout(&out),
        "Counter at 10\n4\nDoubler\nidentity holds\n"
    );
}

#[test]
fn arrays() {
    let out = poplar(&[], &demo("arrays.som"));
    assert_eq!(
        stdout(&out),
        "30\n2\n3\nthere\nconcat\n3\ntrue\ntrue\n"
    );
}

#[test]
fn recoverable_errors_keep_channels_apart() {
    let out = poplar(&[], &demo("errors.som"));
    assert_eq!(stdout(&out), "before\nnil\nnil\nafter\n");
    let err = stderr(&out);
    assert!(err.contains("error: Integer does not understand #frobnicate"), "{err}");
    assert!(err.contains("error: index 5 is out of bounds for size 2"), "{err}");
    assert!(err.contains("error: division by zero"), "{err}");
    assert!(err.contains("at Main>>run @"), "{err}");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn abort_on_error_exits_with_runtime_status() {
    let out = poplar(&["--abort-on-error"], &demo("errors.som"));
    assert_eq!(stdout(&out), "before\n");
    assert!(stderr(&out).contains("does not understand #frobnicate"));
    assert_eq!(out.status.code(), Some(70));
}

#[test]
fn stack_overflow_is_fatal() {
    let path = scratch_program(
        "overflow",
        "Main = ( down = ( ^self down ) run = ( ^self down ) )",
    );
    let out = poplar(&["--max-frames", "32"], &path);
    assert!(stderr(&out).contains("stack overflow"), "{}", stderr(&out));
    assert!(stderr(&out).contains("at Main>>down @"));
    assert_eq!(out.status.code(), Some(70));
}

#[test]
fn missing_main_is_reported() {
    let path = scratch_program("nomain", "Helper = ( run = ( ^1 ) )");
    let out = poplar(&[], &path);
    assert!(stderr(&out).contains("missing entry point: class Main"));
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn parse_errors_fail_the_load() {
    let path = scratch_program("broken", "Main = ( run = ( 'unterminated ) )");
    let out = poplar(&[], &path);
    assert!(stderr(&out).contains("parse error"), "{}", stderr(&out));
    assert!(stdout(&out).is_empty());
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unreadable_file() {
    let out = poplar(&[], &PathBuf::from("/definitely/not/here.som"));
    assert!(stderr(&out).contains("Error reading file"));
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn developer_dumps() {
    let out = poplar(&["--dump-bytecode"], &demo("hello.som"));
    let text = stdout(&out);
    assert!(text.contains("== Main>>run (args: 0, locals: 0) =="), "{text}");
    assert!(text.contains("Send"), "{text}");
    assert!(text.contains("== literals =="));

    let out = poplar(&["--tokens"], &demo("hello.som"));
    assert!(stdout(&out).contains("Hello, world!"));

    let out = poplar(&["--ast"], &demo("hello.som"));
    assert!(stdout(&out).contains("ClassDef"));
    assert_eq!(out.status.code(), Some(0));
}
