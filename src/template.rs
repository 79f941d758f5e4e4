//! Debt-reminder message template.

use crate::store::CustomerRecord;

/// Signature used when none is configured.
pub const DEFAULT_SENDER_NAME: &str = "Bank BRI";

/// Renders the arrears notice sent to a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTemplate {
    sender_name: String,
}

impl Default for ReminderTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SENDER_NAME)
    }
}

impl ReminderTemplate {
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
        }
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn render(&self, customer: &CustomerRecord) -> String {
        format!(
            "*PEMBERITAHUAN TUNGGAKAN KREDIT*\n\
             \n\
             Yth. Bapak/Ibu {name}\n\
             No. Rekening: {account}\n\
             \n\
             Dengan hormat,\n\
             Kami informasikan bahwa rekening Bapak/Ibu tercatat memiliki tunggakan \
             sebesar Rp {amount}.\n\
             \n\
             Status kredit Anda saat ini:\n\
             {score}\n\
             \n\
             Mohon segera melakukan pembayaran untuk menghindari denda keterlambatan.\n\
             \n\
             Abaikan pesan ini jika sudah melakukan pembayaran.\n\
             \n\
             Terima kasih.\n\
             *{sender}*",
            name = customer.customer_name,
            account = customer.account_number,
            amount = format_rupiah(customer.arrears_amount),
            score = credit_score_description(customer.credit_score),
            sender = self.sender_name,
        )
    }
}

/// Group digits in thousands with `.` (`1500000` -> `1.500.000`).
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Collectibility grade description.
pub fn credit_score_description(score: u8) -> &'static str {
    match score {
        1 => "Kredit Lancar - Tidak pernah menunggak",
        2 => "Kredit DPK - Menunggak 1-90 hari",
        3 => "Kredit Tidak Lancar - Menunggak 91-120 hari",
        4 => "Kredit Diragukan - Menunggak 121-180 hari",
        5 => "Kredit Macet - Menunggak lebih dari 180 hari",
        _ => "Status kredit tidak diketahui",
    }
}
