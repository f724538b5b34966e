use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::payment_status::PaymentStatus;

/// How a renewal order ended up being paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethodKind {
    #[serde(rename = "Online")]
    Online,
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
}

impl PaymentMethodKind {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethodKind::Online => "Online",
            PaymentMethodKind::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of a subscription's append-only payment history.
///
/// Written for every renewal attempt that reaches the store, successful or
/// not. `order_id` is set whenever a renewal order was created, so failed
/// entries also point at orders left behind on the commerce platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: Option<i64>,
    pub amount_cents: Option<i64>,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_method: Option<PaymentMethodKind>,
    pub processed_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Parse a decimal money string such as "24.9900" into cents.
///
/// Fractions beyond two digits are rounded half up.
pub fn parse_money_cents(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_digits = fraction.chars().map(|c| c as i64 - '0' as i64);
    let tenths = frac_digits.next().unwrap_or(0);
    let hundredths = frac_digits.next().unwrap_or(0);
    let round_up = frac_digits.next().is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;
    Some(if negative { -cents } else { cents })
}
