// bulkdns/tests/cli_integration.rs

mod common;

use common::{spawn_resolver, Sandbox};
use predicates::prelude::*;
use std::time::Duration;

fn padded(domain: &str) -> String {
    format!("{:<30}", domain)
}

#[test]
fn test_help_lists_flags() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<FILE>"))
        .stdout(predicate::str::contains("--concurrent"))
        .stdout(predicate::str::contains("--resolver"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_version() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_file_argument_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox.command().assert().code(1);
    sandbox.command().args(["--bogus", "domains.txt"]).assert().code(1);
}

#[test]
fn test_zero_concurrency_rejected() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["-c", "0", "domains.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Concurrency must be at least 1"));
}

#[test]
fn test_unopenable_domain_file() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["-r", "127.0.0.1", "does-not-exist.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.txt"));
}

#[test]
fn test_no_resolvers_exits_5() {
    let sandbox = Sandbox::new();
    let resolv_conf = sandbox.file("resolv.conf", "search example.net\noptions edns0\n");
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .arg("--resolv-conf")
        .arg(&resolv_conf)
        .arg(&domains)
        .assert()
        .code(5)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No resolvers found."));
}

#[test]
fn test_unreadable_resolv_conf_exits_1() {
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .args(["--resolv-conf", "/nonexistent/resolv.conf"])
        .arg(&domains)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot initialize the local resolver"));
}

#[test]
fn test_resolves_and_reports_name_error() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file(
        "domains.txt",
        "example.test\nmissing.test\n# skipped\n\nbare.test\nlast.test\n",
    );

    sandbox
        .command()
        .args(["-r", &addr.to_string()])
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{}: ns1.example.test ns2.example.test",
            padded("example.test")
        )))
        .stdout(predicate::str::contains(format!(
            "{}: Name Error (Rcode 3, server {})",
            padded("missing.test"),
            addr
        )))
        .stdout(predicate::str::contains(format!(
            "{}: No NS records (server {})",
            padded("bare.test"),
            addr
        )))
        .stdout(predicate::str::contains(format!(
            "{}: ns1.last.test ns2.last.test",
            padded("last.test")
        )))
        .stdout(predicate::str::contains("skipped").not());
}

#[test]
fn test_sequential_output_follows_input_order() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "c.test\na.test\nb.test\n");

    let output = sandbox
        .command()
        .args(["-r", &addr.to_string()])
        .arg(&domains)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let order: Vec<&str> = stdout
        .lines()
        .map(|line| line.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(order, vec!["c.test", "a.test", "b.test"]);
}

#[test]
fn test_verbose_output() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let resolv_conf = sandbox.file("resolv.conf", &format!("nameserver {}\n", addr));
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .arg("-v")
        .arg("--resolv-conf")
        .arg(&resolv_conf)
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Found resolver {}", addr)))
        .stdout(predicate::str::contains(format!(
            "Resolving example.test using {}",
            addr
        )))
        .stdout(predicate::str::contains("ns1.example.test"))
        .stderr(predicate::str::contains("Resolved 1 domain"));
}

#[test]
fn test_json_output() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "example.test\nmissing.test\n");

    let output = sandbox
        .command()
        .args(["--json", "-c", "2", "-r", &addr.to_string()])
        .arg(&domains)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    records.sort_by_key(|r| r["index"].as_u64().unwrap());

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["domain"], "example.test");
    assert_eq!(records[0]["status"], "success");
    assert_eq!(records[0]["nameservers"][0], "ns1.example.test");
    assert_eq!(records[1]["status"], "protocol_error");
    assert_eq!(records[1]["code"], 3);
    assert_eq!(records[1]["resolver"], addr.to_string());
}

#[test]
fn test_json_verbose_keeps_diagnostics_on_stderr() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "example.test\n");

    let output = sandbox
        .command()
        .args(["--json", "-v", "-r", &addr.to_string()])
        .arg(&domains)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(&format!("Found resolver {}", addr)));
    assert!(stderr.contains(&format!("Resolving example.test using {}", addr)));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    for line in stdout.lines() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(record["domain"], "example.test");
    }
}

#[test]
fn test_undecodable_line_does_not_stop_the_run() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", b"first.test\nbad\xff.test\nlast.test\n");

    sandbox
        .command()
        .args(["-r", &addr.to_string()])
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains("Error resolving"))
        .stdout(predicate::str::contains("not valid UTF-8"))
        .stdout(predicate::str::contains(format!(
            "{}: ns1.last.test ns2.last.test",
            padded("last.test")
        )));
}

#[test]
fn test_explicit_config_file() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let config = sandbox.file(
        "custom.toml",
        &format!(
            "[defaults]\nconcurrency = 4\njson = true\n\n[resolvers]\nservers = [\"{}\"]\n",
            addr
        ),
    );
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .arg("--config")
        .arg(&config)
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"success\""));
}

#[test]
fn test_local_config_discovery() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    sandbox.file(
        "bulkdns.toml",
        &format!("[resolvers]\nservers = [\"{}\"]\n", addr),
    );
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains("ns1.example.test"));
}

#[test]
fn test_invalid_config_file() {
    let sandbox = Sandbox::new();
    let config = sandbox.file("bad.toml", "[defaults]\nconcurrency = 0\n");
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .arg("--config")
        .arg(&config)
        .arg(&domains)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_environment_resolvers() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "example.test\n");

    sandbox
        .command()
        .env("BULKDNS_RESOLVERS", addr.to_string())
        .env("BULKDNS_JSON", "true")
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"domain\":\"example.test\""));
}

#[test]
fn test_cli_flag_beats_environment() {
    let addr = spawn_resolver(Duration::ZERO);
    let sandbox = Sandbox::new();
    let domains = sandbox.file("domains.txt", "example.test\n");

    // The environment points at a resolver that does not exist
    sandbox
        .command()
        .env("BULKDNS_RESOLVERS", "127.0.0.1:1")
        .args(["-r", &addr.to_string()])
        .arg(&domains)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{}: ns1.example.test",
            padded("example.test")
        )));
}
