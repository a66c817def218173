//! Integration Test: Non-Blocking Send Path
//!
//! **Policy**: Delivering a report must never block the reporting client and
//! must never panic inside it.
//! - The Unix socket client switches the socket to non-blocking mode before
//!   connecting and never switches it back
//! - No blocking connect helpers, no write loops, no timeouts
//! - The library never calls `unwrap()` or `expect()` outside tests

use std::path::PathBuf;

use architectural_enforcement::{production_lines, rust_files, violation, workspace_root};

const CLIENT_SOURCE: &str = "relay/core/src/transport/unix_socket/client.rs";

/// Calls that would block or retry on the send path
const FORBIDDEN_IN_CLIENT: &[(&str, &str)] = &[
    ("UnixStream::connect(", "Blocking connect"),
    ("write_all(", "Write retry loop"),
    ("set_nonblocking(false)", "Blocking mode"),
    ("set_write_timeout(", "Write timeout"),
    ("set_read_timeout(", "Read timeout"),
];

fn client_path() -> PathBuf {
    workspace_root().join(CLIENT_SOURCE)
}

#[test]
fn test_send_path_has_no_blocking_calls() {
    let path = client_path();
    let lines = production_lines(&path);
    assert!(!lines.is_empty(), "{CLIENT_SOURCE} not found");

    let mut violations = Vec::new();
    for (line_number, code) in &lines {
        for (pattern, kind) in FORBIDDEN_IN_CLIENT {
            if code.contains(pattern) {
                violations.push(violation(&path, *line_number, kind, code));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking calls found on the report send path!\n");
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        panic!("\nFound {} send path violation(s).", violations.len());
    }
}

#[test]
fn test_socket_is_non_blocking_before_connect() {
    let lines = production_lines(&client_path());

    let nonblocking = lines
        .iter()
        .find(|(_, code)| code.contains("set_nonblocking(true)"))
        .map(|(n, _)| *n)
        .expect("client must set the socket non-blocking");
    let connect = lines
        .iter()
        .find(|(_, code)| code.contains("connect(stream.as_raw_fd()"))
        .map(|(n, _)| *n)
        .expect("client must connect the prepared socket");

    assert!(
        nonblocking < connect,
        "set_nonblocking(true) (line {nonblocking}) must come before connect (line {connect})"
    );
}

#[test]
fn test_library_has_no_panicking_shortcuts() {
    let mut violations = Vec::new();

    for path in rust_files("relay/core/src") {
        for (line_number, code) in production_lines(&path) {
            if code.contains(".unwrap()") || code.contains(".expect(") {
                violations.push(violation(&path, line_number, "Panicking call", &code));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Library code must propagate errors, not panic:\n");
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        panic!("\nFound {} panicking call(s) in relay-core.", violations.len());
    }
}
