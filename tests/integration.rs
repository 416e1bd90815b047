//! Binary-level tests for blockhub.
//!
//! Only commands that need no network access are exercised here.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_blockhub(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_blockhub"))
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .output()
        .expect("Failed to execute blockhub")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_version_command() {
    let output = run_blockhub(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("blockhub"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_command() {
    let output = run_blockhub(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("sources"));
    assert!(stdout.contains("generate"));
}

#[test]
fn test_unknown_command_fails() {
    let output = run_blockhub(&["publish-everything"]);
    assert!(!output.status.success());
}

#[test]
fn test_generate_writes_every_format() {
    let input = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let domains = input.path().join("domains.txt");
    let ips = input.path().join("ips.txt");
    fs::write(&domains, "evil.net\nbad.com\nbad.com\n").unwrap();
    fs::write(&ips, "1.2.3.4\n").unwrap();

    let output = run_blockhub(&[
        "generate",
        "--domains",
        path_str(&domains),
        "--ips",
        path_str(&ips),
        "--output",
        path_str(out.path()),
        "--quiet",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let root = out.path();
    for file in [
        "domains/domains0.list",
        "ips/ips0.list",
        "domains-dotted-format/domains-dotted-format0.list",
        "hosts/hosts0",
        "hosts.windows/hosts0.windows",
        "hosts.deny/hosts0.deny",
        "superhosts.deny/superhosts0.deny",
        "README.md",
    ] {
        assert!(root.join(file).is_file(), "missing {}", file);
    }

    assert_eq!(
        fs::read_to_string(root.join("domains/domains0.list")).unwrap(),
        "bad.com\nevil.net\n"
    );
    let windows = fs::read(root.join("hosts.windows/hosts0.windows")).unwrap();
    assert!(windows.windows(2).any(|w| w == b"\r\n"));
}

#[test]
fn test_generate_missing_input_fails() {
    let out = TempDir::new().unwrap();
    let missing = out.path().join("missing.txt");
    let output = run_blockhub(&[
        "generate",
        "--domains",
        path_str(&missing),
        "--ips",
        path_str(&missing),
        "--output",
        path_str(out.path()),
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nope.yaml");
    let output = run_blockhub(&["-c", path_str(&config), "sources"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected_before_network() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("blockhub.yaml");
    fs::write(
        &config,
        "sources:\n  raw_url_template: http://insecure.example/{source}/\n",
    )
    .unwrap();

    let output = run_blockhub(&["-c", path_str(&config), "run", "--no-deploy"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("HTTPS"), "stderr: {}", stderr);
}

#[test]
fn test_init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("blockhub.yaml");

    let output = run_blockhub(&["-c", path_str(&config), "init"]);
    assert!(output.status.success());
    assert!(fs::read_to_string(&config).unwrap().contains("raw_url_template"));

    // A second init without --force keeps the file
    let output = run_blockhub(&["-c", path_str(&config), "init"]);
    assert!(!output.status.success());
}
