//! Data models for Ductline storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WaitlistEntry {
    pub id: String,
    pub account_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WaitlistBump {
    pub id: String,
    pub entry_id: String,
    pub positions_moved: i64,
    pub from_position: i64,
    pub to_position: i64,
    pub amount_paid_cents: i64,
    pub payment_id: String,
    pub created_at: i64,
}

/// A ledger row joined with the registrant's name, for activity feeds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BumpActivity {
    pub first_name: String,
    pub last_name: String,
    pub positions_moved: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: String,
    pub account_id: Option<String>,
    pub payment_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub description: String,
    pub entry_id: Option<String>,
    pub positions_to_move: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Payment {
    /// The bump this payment pays for, if any.
    pub fn bump_intent(&self) -> Option<(&str, i64)> {
        match (&self.entry_id, self.positions_to_move) {
            (Some(entry_id), Some(n)) if n > 0 => Some((entry_id.as_str(), n)),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }
}

/// Lifecycle of a payment record.
///
/// `Pending` moves to exactly one of the other states and never back. A
/// `Failed` or `Cancelled` record is only ever forced to `Completed`, when
/// the processor reports a capture for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MailingListContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct WaitlistStats {
    pub total_signups: i64,
    pub updated_at: i64,
}
