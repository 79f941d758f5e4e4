//! # wa-sender
//!
//! WhatsApp debt-reminder sender with a managed WhatsApp Web session.
//!
//! The service keeps exactly one WhatsApp client alive, exposes its pairing
//! QR code and status over HTTP, and sends templated arrears notices to
//! customers while logging every outcome.
//!
//! ## Features
//!
//! - **Session management**: guarded initialization, profile reset and
//!   automatic reconnect after a dropped connection
//! - **Pluggable driver**: the browser automation runs behind the
//!   [`driver::Driver`] trait; the default bridge talks JSON lines to a
//!   child process
//! - **Message history**: in-memory log with paging, search and stats
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wa_sender::driver::BridgeDriverFactory;
//! use wa_sender::{SessionManager, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() -> wa_sender::Result<()> {
//!     wa_sender::logging::try_init(None).ok();
//!
//!     let session = SessionManager::new(
//!         SessionSettings::default(),
//!         Arc::new(BridgeDriverFactory::default()),
//!     );
//!     session.initialize(false).await?;
//!
//!     if let Some(qr) = session.qr_code() {
//!         println!("scan me: {}", qr);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;
pub mod template;

// Re-export commonly used types
pub use driver::{Driver, DriverError, DriverEvent, DriverFactory};
pub use error::{Result, SendFailure, WaSenderError};
pub use session::{
    PhoneNumber, SendReceipt, SessionManager, SessionNotification, SessionSettings, SessionState,
    SessionStatus,
};
pub use store::{CustomerRecord, MessageRecord, MessageStatus, MessageStore};
pub use template::ReminderTemplate;
