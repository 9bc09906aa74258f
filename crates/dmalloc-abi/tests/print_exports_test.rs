//! `print_statistics` and `print_leak_report` write straight to fd 1, which
//! the test harness does not capture. The checks re-run this binary in a
//! child process whose only test makes one allocation and prints.

use std::env;
use std::process::Command;

use dmalloc_abi::{dmalloc, print_leak_report, print_statistics};

const CHILD_ENV: &str = "DMALLOC_PRINT_CHILD";
const CHILD_TEST: &str = "print_exports_child";

#[test]
fn print_exports_child() {
    if env::var_os(CHILD_ENV).is_none() {
        return;
    }
    // SAFETY: valid C string literal.
    let p = unsafe { dmalloc(10, c"leak.c".as_ptr(), 5) };
    assert!(!p.is_null());
    print_statistics();
    print_leak_report();
}

fn run_child() -> String {
    let exe = env::current_exe().expect("test binary path");
    let output = Command::new(exe)
        .args(["--exact", CHILD_TEST, "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .expect("spawn child");
    assert!(
        output.status.success(),
        "child failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 stdout")
}

#[test]
fn statistics_and_leak_report_reach_stdout() {
    let stdout = run_child();

    assert!(
        stdout.contains("alloc count: active          1   total          1   fail          0\n"),
        "{stdout}"
    );
    assert!(
        stdout.contains("alloc size:  active         10   total         10   fail          0\n"),
        "{stdout}"
    );

    let start = stdout.find("LEAK CHECK:").expect("leak line");
    let leak = stdout[start..].lines().next().unwrap_or_default();
    assert!(leak.starts_with("LEAK CHECK: leak.c:5: allocated object 0x"), "{leak}");
    assert!(leak.ends_with(" with size 10"), "{leak}");
    assert_eq!(stdout.matches("LEAK CHECK:").count(), 1, "{stdout}");
}
