//! Runs the harness binary in child processes so aborting scenarios can be
//! observed from outside.

use std::process::{Command, Output};

fn harness(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dmalloc-harness"))
        .args(args)
        .env_remove("DMALLOC_ON_BUG")
        .env("DMALLOC_LOG", "off")
        .output()
        .expect("spawn dmalloc-harness")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn list_names_every_scenario() {
    let output = harness(&["list"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for name in [
        "basic",
        "leak",
        "zeroed",
        "realloc",
        "fail",
        "overflow",
        "double-free",
        "invalid-free",
        "interior-free",
        "wild-write",
    ] {
        assert!(text.lines().any(|l| l.starts_with(name)), "missing {name}");
    }
}

#[test]
fn basic_prints_clean_summary() {
    let output = harness(&["run", "basic"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "no leak lines expected: {text}");
    assert_eq!(
        lines[0],
        "alloc count: active          0   total          1   fail          0"
    );
    assert_eq!(
        lines[1],
        "alloc size:  active          0   total        100   fail          0"
    );
}

#[test]
fn leak_lists_two_blocks_in_address_order() {
    let output = harness(&["run", "leak"]);
    assert!(output.status.success());
    let text = stdout(&output);
    let leaks: Vec<&str> = text.lines().filter(|l| l.starts_with("LEAK CHECK: ")).collect();
    assert_eq!(leaks.len(), 2, "{text}");

    let addrs: Vec<u64> = leaks
        .iter()
        .map(|l| {
            let hex = l
                .split("allocated object 0x")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .expect("address field");
            u64::from_str_radix(hex, 16).expect("hex address")
        })
        .collect();
    assert!(addrs[0] < addrs[1]);
    let sizes: Vec<&str> = leaks
        .iter()
        .map(|l| l.rsplit(' ').next().unwrap())
        .collect();
    let mut sorted = sizes.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, ["10", "30"]);
}

#[test]
fn json_report_is_machine_readable() {
    let output = harness(&["run", "overflow", "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["scenario"], "overflow");
    assert_eq!(report["statistics"]["fail_count"], 2);
    assert_eq!(report["statistics"]["total_count"], 0);
    assert_eq!(report["recovered"].as_array().map(Vec::len), Some(2));
    assert!(report["bug"].is_null());
    assert_eq!(report["lifecycle"][0]["event"], "alloc_failed");
}

#[test]
fn bug_scenarios_abort_with_diagnostic() {
    for (scenario, suffix) in [
        ("double-free", ", double free"),
        ("invalid-free", ", not in heap"),
        ("interior-free", ", not allocated"),
        ("wild-write", ""),
    ] {
        let output = harness(&["run", scenario]);
        assert!(!output.status.success(), "{scenario} should abort");
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            assert_eq!(output.status.signal(), Some(6), "{scenario}: SIGABRT");
        }
        assert!(output.stdout.is_empty(), "{scenario}: nothing reaches stdout");

        let err = stderr(&output);
        let line = err
            .lines()
            .find(|l| l.starts_with("MEMORY BUG: "))
            .unwrap_or_else(|| panic!("{scenario}: no diagnostic in {err}"));
        assert!(line.contains("scenario.rs:"), "{scenario}: call site in {line}");
        if suffix.is_empty() {
            assert!(line.contains("detected wild write during free of pointer 0x"));
        } else {
            assert!(line.ends_with(suffix), "{scenario}: {line}");
        }
    }
}

#[test]
fn diagnostic_is_printed_once_with_verbose_logging() {
    let output = Command::new(env!("CARGO_BIN_EXE_dmalloc-harness"))
        .args(["run", "double-free"])
        .env_remove("DMALLOC_ON_BUG")
        .env("DMALLOC_LOG", "debug")
        .output()
        .expect("spawn dmalloc-harness");
    assert!(!output.status.success());
    let err = stderr(&output);
    assert_eq!(err.matches("MEMORY BUG: ").count(), 1, "{err}");
    assert!(err.contains("memory bug"), "debug event in {err}");
}

#[test]
fn report_policy_exits_with_bug_status() {
    let output = harness(&["run", "double-free", "--policy", "report", "--json"]);
    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["policy"], "report");
    assert_eq!(report["statistics"]["active_count"], 0);
    let bug = report["bug"].as_str().expect("bug text");
    assert!(bug.ends_with(", double free"));
    assert!(stderr(&output).contains("MEMORY BUG: "));
}

#[test]
fn env_policy_is_honored() {
    let output = Command::new(env!("CARGO_BIN_EXE_dmalloc-harness"))
        .args(["run", "interior-free"])
        .env("DMALLOC_ON_BUG", "report")
        .env("DMALLOC_LOG", "off")
        .output()
        .expect("spawn dmalloc-harness");
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("LEAK CHECK: "));
}
