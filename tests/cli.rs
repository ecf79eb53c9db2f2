use std::io::Write;
use std::process::{Command, Output, Stdio};

fn tsnetsv(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsnetsv"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

const SEEDED: [&str; 6] = ["--seed", "2012", "--method", "exact", "--max-iter", "250"];

#[test]
fn writes_one_line_per_record() {
    let out = tsnetsv(&SEEDED, "A\t1\t1\t1\nB\t2\t2\t2\nC\t3\t3\t3\n");
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let labels: Vec<&str> = stdout
        .lines()
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    assert_eq!(labels, ["A", "B", "C"]);
    assert!(stdout.lines().all(|line| line.split('\t').count() == 3));
}

#[test]
fn space_separated_input_exits_255_with_hint() {
    let out = tsnetsv(&SEEDED, "A 1 1\nB 2 2\n");
    assert_eq!(out.status.code(), Some(255));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("line 1"));
    assert!(stderr.contains("-w"));
}

#[test]
fn whitespace_flag_accepts_space_separated_input() {
    let mut args = SEEDED.to_vec();
    args.push("-w");
    let out = tsnetsv(&args, "A 1 1\nB 2 2\nC 3 3\n");
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap().lines().count(), 3);
}

#[test]
fn ragged_input_exits_255() {
    let out = tsnetsv(&SEEDED, "A\t1\t2\nB\t3\n");
    assert_eq!(out.status.code(), Some(255));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("line 2"));
}

#[test]
fn non_finite_features_exit_1() {
    let out = tsnetsv(&SEEDED, "A\tnan\t2\nB\t1\t2\nC\t4\t4\n");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8(out.stderr).unwrap().starts_with("ERROR: "));
}

#[test]
fn empty_input_exits_1() {
    let out = tsnetsv(&SEEDED, "");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}
