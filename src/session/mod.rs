//! WhatsApp session management.
//!
//! This module owns the lifecycle of the single WhatsApp client: the state
//! machine, initialization guarding, profile reset, disconnect recovery and
//! outbound sends.

mod manager;
mod phone;
mod profile;
mod qr;
mod state;
mod status;

pub use manager::{SessionManager, SessionSettings, SUPERSEDED};
pub use phone::{PhoneNumber, CONTACT_SUFFIX, COUNTRY_CODE};
pub use profile::SessionProfile;
pub use qr::{QrEncoder, SvgDataUrlEncoder};
pub use state::SessionState;
pub use status::{SendReceipt, SessionNotification, SessionStatus};
