//! Configuration management for wa-sender.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cli::Args;
use crate::driver::BridgeSettings;
use crate::session::SessionSettings;
use crate::template::{ReminderTemplate, DEFAULT_SENDER_NAME};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// WhatsApp session configuration.
    pub whatsapp: WhatsappSection,
    /// Bridge process configuration.
    pub bridge: BridgeSection,
    /// Reminder template configuration.
    pub template: TemplateSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            graceful_shutdown: true,
        }
    }
}

/// WhatsApp session section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsappSection {
    /// Session profile directory.
    pub session_dir: PathBuf,
    /// Auth profile identifier.
    pub client_id: String,
    /// Start the client when the server starts.
    pub autostart: bool,
    pub recovery_delay_secs: u64,
    pub settle_delay_ms: u64,
    pub cleanup_timeout_ms: u64,
    pub pairing_timeout_secs: u64,
}

impl Default for WhatsappSection {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from("./wa-session"),
            client_id: "wa-sender-client".to_string(),
            autostart: true,
            recovery_delay_secs: 5,
            settle_delay_ms: 1000,
            cleanup_timeout_ms: 5000,
            pairing_timeout_secs: 60,
        }
    }
}

/// Bridge process section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Program to run.
    pub program: String,
    /// Arguments passed before the profile arguments.
    pub args: Vec<String>,
    pub request_timeout_secs: u64,
    pub init_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["bridge/index.js".to_string()],
            request_timeout_secs: 30,
            init_timeout_secs: 120,
        }
    }
}

impl BridgeSection {
    /// Replace program and arguments from a single command line.
    fn set_command_line(&mut self, command_line: &str) {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        if let Some(program) = parts.next() {
            self.program = program;
            self.args = parts.collect();
        }
    }
}

/// Reminder template section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    /// Signature at the end of every reminder.
    pub sender_name: String,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            sender_name: DEFAULT_SENDER_NAME.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("WA_SENDER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("WA_SENDER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(dir) = var("WA_SENDER_SESSION_DIR") {
            if !dir.is_empty() {
                self.whatsapp.session_dir = PathBuf::from(dir);
            }
        }

        if let Some(client_id) = var("WA_SENDER_CLIENT_ID") {
            if !client_id.is_empty() {
                self.whatsapp.client_id = client_id;
            }
        }

        if let Some(bridge) = var("WA_SENDER_BRIDGE") {
            self.bridge.set_command_line(&bridge);
        }

        if let Some(level) = var("WA_SENDER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref dir) = args.session_dir {
            self.whatsapp.session_dir = dir.clone();
        }

        if let Some(ref bridge) = args.bridge {
            self.bridge.set_command_line(bridge);
        }

        if args.no_autostart {
            self.whatsapp.autostart = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port);
        server_config.graceful_shutdown = self.server.graceful_shutdown;
        Ok(server_config)
    }

    /// Session manager settings.
    pub fn to_session_settings(&self) -> SessionSettings {
        let whatsapp = &self.whatsapp;
        SessionSettings {
            client_id: whatsapp.client_id.clone(),
            profile_dir: whatsapp.session_dir.clone(),
            recovery_delay: Duration::from_secs(whatsapp.recovery_delay_secs),
            settle_delay: Duration::from_millis(whatsapp.settle_delay_ms),
            cleanup_timeout: Duration::from_millis(whatsapp.cleanup_timeout_ms),
            pairing_timeout: Duration::from_secs(whatsapp.pairing_timeout_secs),
        }
    }

    /// Bridge process settings.
    pub fn to_bridge_settings(&self) -> Result<BridgeSettings, ConfigError> {
        if self.bridge.program.trim().is_empty() {
            return Err(ConfigError::InvalidBridge(self.bridge.program.clone()));
        }

        Ok(BridgeSettings {
            program: self.bridge.program.clone(),
            args: self.bridge.args.clone(),
            request_timeout: Duration::from_secs(self.bridge.request_timeout_secs),
            init_timeout: Duration::from_secs(self.bridge.init_timeout_secs),
        })
    }

    pub fn to_template(&self) -> ReminderTemplate {
        ReminderTemplate::new(self.template.sender_name.clone())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Bridge program missing.
    InvalidBridge(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidBridge(program) => write!(f, "invalid bridge program: '{}'", program),
        }
    }
}

impl std::error::Error for ConfigError {}
