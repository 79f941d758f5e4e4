//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SendFailure;
use crate::store::{CustomerRecord, HistoryPage, MessageRecord};

/// Query parameters of the QR endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QrParams {
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default, rename = "hardReset", alias = "hard_reset")]
    pub hard_reset: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref().map(str::trim), Some("true" | "1"))
}

impl QrParams {
    pub fn refresh(&self) -> bool {
        flag(&self.refresh)
    }

    pub fn hard_reset(&self) -> bool {
        flag(&self.hard_reset)
    }
}

/// Current pairing image and session flags.
#[derive(Debug, Clone, Serialize)]
pub struct QrResponse {
    pub success: bool,
    pub qr: Option<String>,
    pub ready: bool,
    pub initializing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgment of a fire-and-forget refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub refreshing: bool,
    pub hard_reset: bool,
    pub qr: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RefreshResponse {
    pub fn initiated(hard_reset: bool) -> Self {
        Self {
            success: true,
            refreshing: true,
            hard_reset,
            qr: None,
            message: "QR code refresh initiated. Please wait while a new QR code is generated."
                .to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Request to send a free-form message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearSessionResponse {
    pub success: bool,
}

/// Request to send a debt reminder to a customer.
///
/// Both the English field names and the Indonesian ones used by older
/// front ends are accepted. Amounts may be numbers or numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    #[serde(default, alias = "namaNasabah")]
    pub customer_name: Option<String>,
    #[serde(default, alias = "nomorTelepon")]
    pub phone_number: Option<String>,
    #[serde(default, alias = "noRekening")]
    pub account_number: Option<String>,
    #[serde(default, alias = "jumlahTunggakan")]
    pub arrears_amount: Option<Value>,
    #[serde(default, alias = "skorKredit")]
    pub credit_score: Option<Value>,
}

fn required_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_number(value: Option<Value>) -> Option<u64> {
    let number = match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| *n > 0)
}

impl ReminderRequest {
    /// Validate into a customer record.
    pub fn into_customer(self) -> Result<CustomerRecord, String> {
        let missing = || "All fields are required".to_string();

        let customer_name = required_text(self.customer_name).ok_or_else(missing)?;
        let phone_number = required_text(self.phone_number).ok_or_else(missing)?;
        let account_number = required_text(self.account_number).ok_or_else(missing)?;
        let arrears_amount = required_number(self.arrears_amount).ok_or_else(missing)?;
        let credit_score = required_number(self.credit_score).ok_or_else(missing)?;
        let credit_score = u8::try_from(credit_score)
            .map_err(|_| format!("credit score {credit_score} is out of range"))?;

        Ok(CustomerRecord {
            customer_name,
            phone_number,
            account_number,
            arrears_amount,
            credit_score,
        })
    }
}

/// Result of a reminder send.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderResponse {
    pub success: bool,
    pub message: String,
    pub data: MessageRecord,
}

/// Request to change a history record's status.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reply: Option<String>,
}

/// History listing.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: HistoryPage,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "NOT_READY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Classified send failure, for send errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SendFailure>,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            reason: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_ready() -> Self {
        Self::new(
            "NOT_READY",
            "WhatsApp client is not ready. Please scan the QR code first.",
        )
    }

    pub fn send_failed(reason: SendFailure, details: impl Into<String>) -> Self {
        let code = match reason {
            SendFailure::InvalidFormat => "INVALID_FORMAT",
            SendFailure::NotWhatsappUser => "NOT_WHATSAPP_USER",
            SendFailure::Unknown => "SEND_FAILED",
        };
        let mut response = Self::new(code, reason.user_message()).with_details(details);
        response.reason = Some(reason);
        response
    }

    pub fn message_not_found(id: u64) -> Self {
        Self::new("MESSAGE_NOT_FOUND", format!("Message '{}' not found", id))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_qr_params_flags() {
        let params: QrParams = serde_json::from_value(json!({"refresh": "true"})).unwrap();
        assert!(params.refresh());
        assert!(!params.hard_reset());

        let params: QrParams = serde_json::from_value(json!({"hard_reset": "1"})).unwrap();
        assert!(params.hard_reset());

        let params: QrParams = serde_json::from_value(json!({"hardReset": "false"})).unwrap();
        assert!(!params.hard_reset());
    }

    #[test]
    fn test_reminder_request_english_fields() {
        let req: ReminderRequest = serde_json::from_value(json!({
            "customerName": "Budi",
            "phoneNumber": "08123456789",
            "accountNumber": "123",
            "arrearsAmount": 1500000,
            "creditScore": 2
        }))
        .unwrap();
        let customer = req.into_customer().unwrap();
        assert_eq!(customer.arrears_amount, 1_500_000);
        assert_eq!(customer.credit_score, 2);
    }

    #[test]
    fn test_reminder_request_indonesian_aliases() {
        let req: ReminderRequest = serde_json::from_value(json!({
            "namaNasabah": "Siti",
            "nomorTelepon": "0812",
            "noRekening": "456",
            "jumlahTunggakan": "250000",
            "skorKredit": "5"
        }))
        .unwrap();
        let customer = req.into_customer().unwrap();
        assert_eq!(customer.customer_name, "Siti");
        assert_eq!(customer.arrears_amount, 250_000);
        assert_eq!(customer.credit_score, 5);
    }

    #[test]
    fn test_reminder_request_missing_field() {
        let req: ReminderRequest = serde_json::from_value(json!({
            "customerName": "Budi",
            "phoneNumber": "08123456789",
            "accountNumber": "  ",
            "arrearsAmount": 1,
            "creditScore": 1
        }))
        .unwrap();
        assert_eq!(req.into_customer().unwrap_err(), "All fields are required");
    }

    #[test]
    fn test_reminder_request_zero_amount_rejected() {
        let req: ReminderRequest = serde_json::from_value(json!({
            "customerName": "Budi",
            "phoneNumber": "08123456789",
            "accountNumber": "1",
            "arrearsAmount": 0,
            "creditScore": 1
        }))
        .unwrap();
        assert!(req.into_customer().is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let err = ErrorResponse::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("TEST_ERROR"));
        assert!(json.contains("Test message"));
        assert!(!json.contains("details"));
        assert!(!json.contains("reason"));
    }

    #[test]
    fn test_send_failed_codes() {
        let err = ErrorResponse::send_failed(SendFailure::NotWhatsappUser, "not registered");
        assert_eq!(err.code, "NOT_WHATSAPP_USER");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["reason"], "not-whatsapp-user");
        assert_eq!(json["details"], "not registered");
    }
}
