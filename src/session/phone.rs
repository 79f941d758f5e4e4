//! Destination number normalization.

use std::fmt;

use crate::error::{Result, SendFailure, WaSenderError};

/// Country code assumed for local numbers.
pub const COUNTRY_CODE: &str = "62";

/// Suffix the driver expects on individual chat ids.
pub const CONTACT_SUFFIX: &str = "@c.us";

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// A destination number in international form without the `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize user input such as `0812-3456-789` or `+62 812 3456 789`.
    ///
    /// Separators are discarded, a local leading `0` becomes the country
    /// code and numbers without it get the country code prepended. Results
    /// outside 10..=15 digits are rejected as `invalid-format`.
    pub fn normalize(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(char::is_ascii_digit).collect();

        let number = if let Some(local) = digits.strip_prefix('0') {
            format!("{COUNTRY_CODE}{local}")
        } else if digits.starts_with(COUNTRY_CODE) {
            digits
        } else {
            format!("{COUNTRY_CODE}{digits}")
        };

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&number.len()) {
            return Err(WaSenderError::send(
                SendFailure::InvalidFormat,
                format!(
                    "phone number must have {MIN_DIGITS} to {MAX_DIGITS} digits, got {} ({})",
                    number.len(),
                    number
                ),
            ));
        }

        Ok(Self(number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Destination id in the driver's contact convention.
    pub fn chat_id(&self) -> String {
        format!("{}{}", self.0, CONTACT_SUFFIX)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
