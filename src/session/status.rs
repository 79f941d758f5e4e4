//! Values the session manager reports to its callers.

use serde::Serialize;

/// Snapshot returned by status polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub ready: bool,
    pub initializing: bool,
    pub last_error: Option<String>,
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub success: bool,
    pub message_id: String,
    pub normalized_to: String,
}

/// Broadcast to subscribers when the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    /// A new pairing image (data URL).
    Qr(String),
    Ready,
    AuthFailure(String),
    Disconnected(String),
}
