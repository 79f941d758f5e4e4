//! Bridge wire protocol.
//!
//! One JSON object per line in each direction.
//!
//! Request (service to bridge):
//! ```json
//! {"id": 3, "method": "sendMessage", "params": {"chatId": "628123456789@c.us", "text": "hi"}}
//! ```
//!
//! Response (bridge to service), either
//! ```json
//! {"id": 3, "result": {"id": "3EB0C767D26A"}}
//! ```
//! or
//! ```json
//! {"id": 3, "error": {"message": "Evaluation failed: invalid wid"}}
//! ```
//!
//! Event (bridge to service, no `id`):
//! ```json
//! {"event": "qr", "params": {"qr": "2@abc..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DriverEvent;

/// Request sent to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation ID echoed back in the response.
    pub id: u32,
    pub method: String,
    pub params: Value,
}

/// Response from the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u32,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

/// Failure details in a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Unsolicited lifecycle event from the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub event: String,
    #[serde(default)]
    pub params: Value,
}

/// Anything the bridge can print on stdout.
///
/// Responses carry an `id`, events carry an `event` name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Response(Response),
    Event(Event),
}

impl Event {
    /// Map a wire event onto a driver event. Unknown events yield `None`.
    pub fn into_driver_event(self) -> Option<DriverEvent> {
        let text = |key: &str, fallback: &str| {
            self.params
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };

        match self.event.as_str() {
            "qr" => self
                .params
                .get("qr")
                .and_then(Value::as_str)
                .map(|qr| DriverEvent::Qr(qr.to_string())),
            "ready" => Some(DriverEvent::Ready),
            "auth_failure" => Some(DriverEvent::AuthFailure(text("message", "unknown"))),
            "disconnected" => Some(DriverEvent::Disconnected(text("reason", "UNKNOWN"))),
            _ => None,
        }
    }
}
