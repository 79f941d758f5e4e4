//! Error types for wa-sender.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::driver::DriverError;

/// Why an outbound message could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendFailure {
    /// The destination number is malformed or has the wrong length.
    InvalidFormat,
    /// The number is not registered on WhatsApp.
    NotWhatsappUser,
    /// Anything the driver reported that we could not classify.
    Unknown,
}

impl SendFailure {
    /// Classify a driver failure message.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        let has = |needle: &str| message.contains(needle);

        if has("invalid wid") || has("invalid number") || has("wid error") {
            Self::InvalidFormat
        } else if has("not registered")
            || has("not a whatsapp user")
            || has("not on whatsapp")
            || has("no lid")
        {
            Self::NotWhatsappUser
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid-format",
            Self::NotWhatsappUser => "not-whatsapp-user",
            Self::Unknown => "unknown",
        }
    }

    /// Operator-facing explanation.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "Invalid phone number format",
            Self::NotWhatsappUser => "The phone number is not registered on WhatsApp",
            Self::Unknown => "Failed to send the WhatsApp message",
        }
    }
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for wa-sender operations.
#[derive(Error, Debug)]
pub enum WaSenderError {
    /// Driver construction or its initialize call failed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A send was attempted while the session is not ready.
    #[error("WhatsApp client is not ready")]
    NotReady,

    /// Outbound delivery failed.
    #[error("send failed ({reason}): {message}")]
    Send {
        reason: SendFailure,
        message: String,
    },

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionState,
        to: crate::session::SessionState,
    },

    /// Driver-level failure.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Pairing payload could not be rendered.
    #[error("QR encoding error: {0}")]
    QrEncode(String),

    /// Message record with the given ID was not found.
    #[error("message not found: {0}")]
    MessageNotFound(u64),

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl WaSenderError {
    /// Shorthand for a classified send failure.
    pub fn send(reason: SendFailure, message: impl Into<String>) -> Self {
        Self::Send {
            reason,
            message: message.into(),
        }
    }
}

/// Convenience Result type for wa-sender operations.
pub type Result<T> = std::result::Result<T, WaSenderError>;
