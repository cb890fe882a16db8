//! Transfer model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transfer entity recording a movement of value between two accounts.
///
/// Amounts are stored in cents to avoid floating-point rounding. The row is a
/// plain record; no balance accounting happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Unique identifier
    pub id: i64,
    /// Sending user ID
    pub sender_id: i64,
    /// Receiving user ID
    pub recipient_id: i64,
    /// Amount in cents (always positive)
    pub amount_cents: i64,
    /// Optional free-form note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Create a new Transfer record.
    pub fn new(sender_id: i64, recipient_id: i64, amount_cents: i64, note: Option<String>) -> Self {
        Self {
            id: 0, // Will be set by the database
            sender_id,
            recipient_id,
            amount_cents,
            note,
            created_at: Utc::now(),
        }
    }

    /// Check whether the given user sent or received this transfer
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}
