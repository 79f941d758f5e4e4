//! Message record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer data a reminder is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub customer_name: String,
    pub phone_number: String,
    pub account_number: String,
    /// Outstanding amount in whole rupiah.
    pub arrears_amount: u64,
    /// Collectibility grade, 1 (current) to 5 (loss).
    pub credit_score: u8,
}

/// Delivery status of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Replied,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Replied => "replied",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sent" => Ok(Self::Sent),
            "replied" => Ok(Self::Replied),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown message status: {other}")),
        }
    }
}

/// An outbound message about to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Destination as sent (normalized when normalization succeeded).
    pub to: String,
    pub text: String,
    pub customer: Option<CustomerRecord>,
}

impl Delivery {
    pub fn new(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            text: text.into(),
            customer: None,
        }
    }

    pub fn for_customer(mut self, customer: CustomerRecord) -> Self {
        self.customer = Some(customer);
        self
    }
}

/// A logged outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: u64,
    #[serde(flatten)]
    pub customer: Option<CustomerRecord>,
    pub recipient: String,
    pub message: String,
    pub status: MessageStatus,
    pub wa_message_id: Option<String>,
    pub failure_reason: Option<String>,
    pub reply_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Whether every search term occurs in one of the searchable fields.
    pub(crate) fn matches_terms(&self, terms: &[String]) -> bool {
        let mut haystacks = vec![self.recipient.to_lowercase()];
        if let Some(customer) = &self.customer {
            haystacks.push(customer.customer_name.to_lowercase());
            haystacks.push(customer.phone_number.to_lowercase());
            haystacks.push(customer.account_number.to_lowercase());
            haystacks.push(customer.arrears_amount.to_string());
            haystacks.push(customer.credit_score.to_string());
        }

        terms
            .iter()
            .all(|term| haystacks.iter().any(|field| field.contains(term.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(customer: Option<CustomerRecord>) -> MessageRecord {
        let now = Utc::now();
        MessageRecord {
            id: 1,
            customer,
            recipient: "628123456789".into(),
            message: "hello".into(),
            status: MessageStatus::Sent,
            wa_message_id: Some("ABC".into()),
            failure_reason: None,
            reply_message: None,
            sent_at: Some(now),
            replied_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn budi() -> CustomerRecord {
        CustomerRecord {
            customer_name: "Budi Santoso".into(),
            phone_number: "08123456789".into(),
            account_number: "0012-01-000123-50-1".into(),
            arrears_amount: 1_500_000,
            credit_score: 3,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Replied".parse::<MessageStatus>().unwrap(), MessageStatus::Replied);
        assert!("pending".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_customer_fields_flattened() {
        let json = serde_json::to_value(record(Some(budi()))).unwrap();
        assert_eq!(json["customerName"], "Budi Santoso");
        assert_eq!(json["arrearsAmount"], 1_500_000);
        assert_eq!(json["status"], "sent");
        assert_eq!(json["waMessageId"], "ABC");
    }

    #[test]
    fn test_plain_message_has_no_customer_fields() {
        let json = serde_json::to_value(record(None)).unwrap();
        assert!(json.get("customerName").is_none());
        assert_eq!(json["recipient"], "628123456789");
    }

    #[test]
    fn test_terms_must_all_match() {
        let record = record(Some(budi()));
        assert!(record.matches_terms(&["budi".into(), "santoso".into()]));
        assert!(record.matches_terms(&["budi".into(), "1500000".into()]));
        assert!(!record.matches_terms(&["budi".into(), "andi".into()]));
        assert!(record.matches_terms(&[]));
    }
}
