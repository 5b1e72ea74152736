//! Stop-signal handling. Lives in its own test binary because it signals the
//! whole process.

#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

use reminder_scheduler::signal::ShutdownSignal;

fn send_to_self(signal: &str) {
    let status = Command::new("kill")
        .args([&format!("-{signal}"), &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_sigterm_and_sigint_are_caught() {
    let mut shutdown = ShutdownSignal::install().unwrap();

    send_to_self("TERM");
    let name = tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
        .await
        .expect("SIGTERM should be delivered to the handler");
    assert_eq!(name, "SIGTERM");

    send_to_self("INT");
    let name = tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
        .await
        .expect("SIGINT should be delivered to the handler");
    assert_eq!(name, "SIGINT");
}
