//! CLI Integration Tests
//!
//! These tests run the `switchmate` binary for behaviour that needs no
//! hardware: argument handling and configuration errors.

use std::io::Write;
use std::process::Command;

fn switchmate(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_switchmate"))
        .args(args)
        .env_remove("SWITCHMATE_DEVICE")
        .output()
        .expect("failed to run switchmate")
}

#[test]
fn test_help_lists_commands() {
    let output = switchmate(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["scan", "status", "set", "watch"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_set_requires_action() {
    let output = switchmate(&["set"]);
    assert!(!output.status.success());
}

#[test]
fn test_status_without_device_fails() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    config.write_all(b"").unwrap();

    let output = switchmate(&["-c", config.path().to_str().unwrap(), "status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No device specified"), "stderr: {stderr}");
}

#[test]
fn test_invalid_config_is_reported() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    config
        .write_all(b"[device]\nupdate_interval_secs = 0\n")
        .unwrap();

    let output = switchmate(&["-c", config.path().to_str().unwrap(), "status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("device.update_interval_secs"), "stderr: {stderr}");
}
