//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. The sender runs on
//! the reporting client's own threads; the relay waits on I/O, never on time.
//! **Exceptions**: Test code

use architectural_enforcement::{production_lines, rust_files, violation, PRODUCTION_DIRS};

const FORBIDDEN: &[&str] = &["thread::sleep", "tokio::time::sleep", "time::sleep("];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_files(dir) {
            for (line_number, code) in production_lines(&path) {
                if FORBIDDEN.iter().any(|pattern| code.contains(pattern)) {
                    violations.push(violation(&path, line_number, "Sleep call", &code));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        eprintln!("\n✅ Wait on I/O readiness, channels or signals instead.");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
