//! Process-level contract of the worker binary: exit codes and output
//! streams. The scheduler only reads the exit code; diagnostics must land
//! on stderr, never stdout.

use std::process::Command;

#[test]
fn missing_config_exits_nonzero_with_diagnostics_on_stderr() {
    let output = Command::new(env!("CARGO_BIN_EXE_boxrotate"))
        .env_remove("BOXROTATE_GIST_ID")
        .env_remove("BOXROTATE_GH_TOKEN")
        .env_remove("BOXROTATE_DNS_LABEL")
        .env_remove("BOXROTATE_FTP_PASSWORD")
        .env_remove("RUST_LOG")
        .output()
        .expect("binary should spawn");

    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("rotation failed"),
        "expected the failure diagnostic on stderr, got: {stderr}"
    );
    assert!(
        stderr.contains("missing required configuration"),
        "expected the underlying cause on stderr, got: {stderr}"
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.is_empty(),
        "stdout should stay clean, got: {stdout}"
    );
}
