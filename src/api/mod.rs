//! HTTP API for wa-sender.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api` - API information
//!
//! ### WhatsApp session
//! - `GET /api/whatsapp/status` - Session status
//! - `GET /api/whatsapp/qr?refresh=&hardReset=` - Pairing QR code or refresh trigger
//! - `POST /api/whatsapp/send` - Send a free-form message
//! - `POST /api/whatsapp/clear-session` - Wipe the stored session
//!
//! ### Reminders & history
//! - `POST /api/messages/send` - Send a debt reminder
//! - `GET /api/history` - Paged message history
//! - `GET /api/history/{id}` - One message record
//! - `PATCH /api/history/{id}` - Update a record's status
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wa_sender::api::{serve_with_state, AppState, ServerConfig};
//! use wa_sender::driver::BridgeDriverFactory;
//! use wa_sender::session::{SessionManager, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() -> wa_sender::Result<()> {
//!     let factory = Arc::new(BridgeDriverFactory::default());
//!     let session = SessionManager::new(SessionSettings::default(), factory);
//!     session.start();
//!
//!     serve_with_state(ServerConfig::default(), AppState::new(session)).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use handlers::{api_error, ApiError, AppState};
pub use router::{create_router, serve_with_state, ServerConfig};
pub use types::{
    ClearSessionResponse, ErrorResponse, HistoryResponse, QrParams, QrResponse, RefreshResponse,
    ReminderRequest, ReminderResponse, SendMessageRequest, UpdateStatusRequest,
};
