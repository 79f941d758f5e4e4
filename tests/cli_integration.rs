//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use wa_sender::cli::{parse_args_from, Args};
use wa_sender::config::Config;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("wa-sender")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

/// File, no environment, then arguments.
fn resolve(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).unwrap(),
        None => Config::default(),
    };
    config.apply_env_from(|_| None);
    config.apply_args(args);
    config
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(result.config.is_none());
    assert!(result.session_dir.is_none());
    assert!(result.bridge.is_none());
    assert!(!result.no_autostart);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-s",
        "/var/lib/wa",
        "-b",
        "node ./wa-bridge.js",
        "-l",
        "debug",
        "--no-autostart",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.session_dir, Some(PathBuf::from("/var/lib/wa")));
    assert_eq!(result.bridge.as_deref(), Some("node ./wa-bridge.js"));
    assert_eq!(result.log_level.as_deref(), Some("debug"));
    assert!(result.no_autostart);
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/wa-sender.json"])).unwrap();

    assert_eq!(result.config, Some(PathBuf::from("/etc/wa-sender.json")));
}

#[test]
fn test_cli_invalid_port() {
    let result = parse_args_from(args(&["-p", "not-a-number"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_invalid_host() {
    let result = parse_args_from(args(&["-H", "not-an-ip"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_rejects_positional_arguments() {
    let result = parse_args_from(args(&["serve"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
            "server": {
                "host": "192.168.1.100",
                "port": 9000,
                "graceful_shutdown": false
            },
            "whatsapp": {
                "session_dir": "/srv/wa",
                "client_id": "collections",
                "autostart": false,
                "recovery_delay_secs": 10
            },
            "bridge": {
                "program": "bun",
                "args": ["bridge.ts"]
            },
            "template": {
                "sender_name": "Bank Contoh"
            },
            "logging": {
                "level": "debug"
            }
        }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.host, "192.168.1.100");
    assert_eq!(config.server.port, 9000);
    assert!(!config.server.graceful_shutdown);
    assert_eq!(config.whatsapp.client_id, "collections");
    assert!(!config.whatsapp.autostart);
    assert_eq!(config.logging.level, "debug");

    let settings = config.to_session_settings();
    assert_eq!(settings.profile_dir, PathBuf::from("/srv/wa"));
    assert_eq!(settings.recovery_delay, Duration::from_secs(10));
    // Unset fields keep their defaults
    assert_eq!(settings.pairing_timeout, Duration::from_secs(60));

    let bridge = config.to_bridge_settings().unwrap();
    assert_eq!(bridge.program, "bun");
    assert_eq!(bridge.args, vec!["bridge.ts"]);

    assert_eq!(config.to_template().sender_name(), "Bank Contoh");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(
        r#"{
            "server": {"host": "10.0.0.1", "port": 7000},
            "whatsapp": {"session_dir": "/from/file"},
            "bridge": {"program": "bun", "args": ["bridge.ts"]}
        }"#,
    );

    let args = parse_args_from(args(&[
        "-c",
        file.path().to_str().unwrap(),
        "-p",
        "8000",
        "-s",
        "/from/cli",
        "-b",
        "node other.js --flag",
    ]))
    .unwrap();
    let config = resolve(&args);

    // CLI wins where given
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.whatsapp.session_dir, PathBuf::from("/from/cli"));
    assert_eq!(config.bridge.program, "node");
    assert_eq!(config.bridge.args, vec!["other.js", "--flag"]);
    // File value survives otherwise
    assert_eq!(config.server.host, "10.0.0.1");
}

#[test]
fn test_config_env_between_file_and_cli() {
    let file = config_file(r#"{"server": {"port": 7000}, "logging": {"level": "warn"}}"#);

    let mut config = Config::from_file(file.path()).unwrap();
    config.apply_env_from(|key| match key {
        "WA_SENDER_PORT" => Some("7100".to_string()),
        "WA_SENDER_CLIENT_ID" => Some("env-client".to_string()),
        "RUST_LOG" => Some("trace".to_string()),
        _ => None,
    });

    assert_eq!(config.server.port, 7100);
    assert_eq!(config.whatsapp.client_id, "env-client");
    assert_eq!(config.log_filter(), "trace");

    config.apply_args(&Args {
        port: Some(7200),
        ..Args::default()
    });
    assert_eq!(config.server.port, 7200);
    assert_eq!(config.whatsapp.client_id, "env-client");
}

#[test]
fn test_config_no_autostart() {
    let args = parse_args_from(args(&["--no-autostart"])).unwrap();
    let config = resolve(&args);

    assert!(!config.whatsapp.autostart);
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/wa-sender.json")),
        ..Args::default()
    };

    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_to_server_config() {
    let args = parse_args_from(args(&["-H", "0.0.0.0", "-p", "8080"])).unwrap();
    let config = resolve(&args);
    let server_config = config.to_server_config().unwrap();

    assert_eq!(server_config.host, "0.0.0.0");
    assert_eq!(server_config.port, 8080);
    assert!(server_config.graceful_shutdown);
}

#[test]
fn test_config_invalid_host_in_file() {
    let file = config_file(r#"{"server": {"host": "localhost-ish"}}"#);
    let config = Config::from_file(file.path()).unwrap();

    assert!(config.to_server_config().is_err());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"server": {"port": 9999}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.host, "127.0.0.1"); // Default
    assert!(config.server.graceful_shutdown); // Default
    assert!(config.whatsapp.autostart); // Default
    assert_eq!(config.bridge.program, "node"); // Default
}
