//! Driver adapter abstraction.
//!
//! A driver is the browser-automation-backed WhatsApp client the session
//! manager controls. The manager only depends on the [`Driver`] and
//! [`DriverFactory`] traits; lifecycle signals flow back through an
//! [`EventSink`] handed to the factory at construction time.
//!
//! [`bridge`] provides the production implementation, which runs the
//! automation in a child process and talks to it over line-delimited JSON.

pub mod bridge;
pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use bridge::{BridgeDriver, BridgeDriverFactory, BridgeSettings};

/// Errors reported by a driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The driver rejected or failed an operation.
    #[error("{0}")]
    Failed(String),

    /// The operation did not complete in time.
    #[error("driver call timed out: {0}")]
    Timeout(String),

    /// The driver connection is gone.
    #[error("driver connection closed")]
    Closed,

    /// Malformed message on the driver channel.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error talking to the driver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Convenience Result type for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Lifecycle event emitted by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A (possibly rotated) pairing payload to be shown as a QR code.
    Qr(String),
    /// The client is authenticated and can send.
    Ready,
    /// Authentication was rejected.
    AuthFailure(String),
    /// The connection dropped.
    Disconnected(String),
}

/// Sending half of a driver's event stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the session manager drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. Returns `false` once nobody is listening anymore.
    pub fn emit(&self, event: DriverEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Construction input for a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Fixed identifier of the auth profile.
    pub client_id: String,
    /// Directory the driver persists its session profile in.
    pub data_path: PathBuf,
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Driver-assigned message identifier.
    pub id: String,
}

/// Result of a contact lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactInfo {
    pub is_known_contact: bool,
}

/// A live WhatsApp client.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Start the client. Pairing codes and readiness arrive as events.
    async fn initialize(&self) -> DriverResult<()>;

    /// Close the underlying browser context.
    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }

    /// Tear the client down. The instance is unusable afterwards.
    async fn destroy(&self) -> DriverResult<()>;

    /// Send `text` to a destination id such as `628123456789@c.us`.
    async fn send_to(&self, chat_id: &str, text: &str) -> DriverResult<SentMessage>;

    /// Look up a destination in the client's contact list.
    async fn lookup_contact(&self, chat_id: &str) -> DriverResult<ContactInfo>;
}

/// Builds driver instances bound to a session profile.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self, options: &DriverOptions, events: EventSink)
        -> DriverResult<Arc<dyn Driver>>;
}

/// Run a driver call with an upper bound on its duration.
pub(crate) async fn bounded<T>(
    what: &str,
    limit: Duration,
    call: impl std::future::Future<Output = DriverResult<T>>,
) -> DriverResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(DriverError::Timeout(what.to_string())))
}
