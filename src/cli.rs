//! Command-line interface for wa-sender.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Options left unset fall through to the environment, the config file and
/// finally the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Session profile directory.
    pub session_dir: Option<PathBuf>,
    /// Bridge command line, e.g. `node bridge/index.js`.
    pub bridge: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Do not start the WhatsApp client at boot.
    pub no_autostart: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("session-dir") => {
                result.session_dir = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("bridge") => {
                let value: String = parser.value()?.parse()?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue("bridge", value));
                }
                result.bridge = Some(value);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("no-autostart") => {
                result.no_autostart = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"wa-sender {version}
WhatsApp debt-reminder sender

USAGE:
    wa-sender [OPTIONS]

OPTIONS:
    -H, --host <ADDR>         Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>         Port to listen on [default: 5000]
    -c, --config <FILE>       Path to configuration file (JSON)
    -s, --session-dir <DIR>   WhatsApp session profile directory [default: ./wa-session]
    -b, --bridge <CMD>        Bridge command line [default: node bridge/index.js]
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
        --no-autostart        Start the WhatsApp client on first QR request only
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    WA_SENDER_HOST          Host address (overrides config)
    WA_SENDER_PORT          Port number (overrides config)
    WA_SENDER_SESSION_DIR   Session profile directory (overrides config)
    WA_SENDER_CLIENT_ID     Auth profile identifier (overrides config)
    WA_SENDER_BRIDGE        Bridge command line (overrides config)
    WA_SENDER_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:5000)
    wa-sender

    # Listen on all interfaces with a dedicated profile directory
    wa-sender -H 0.0.0.0 -p 8080 -s /var/lib/wa-sender

    # Start with config file
    wa-sender -c /etc/wa-sender/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("wa-sender {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
