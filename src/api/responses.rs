//! Shared API response types
//!
//! Common response structures used across multiple endpoints to keep the
//! wire format consistent.

use serde::Serialize;

use crate::models::{Transfer, User};

/// User representation returned by the API. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub status: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            status: user.status.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Transfer representation returned by the API
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            sender_id: transfer.sender_id,
            recipient_id: transfer.recipient_id,
            amount_cents: transfer.amount_cents,
            note: transfer.note,
            created_at: transfer.created_at.to_rfc3339(),
        }
    }
}

/// Paginated user list response
#[derive(Debug, Serialize)]
pub struct PaginatedUsersResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Paginated transfer list response
#[derive(Debug, Serialize)]
pub struct PaginatedTransfersResponse {
    pub transfers: Vec<TransferResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use chrono::Utc;

    #[test]
    fn test_user_response_omits_password_hash() {
        let user = User::new(
            "alice@example.com".to_string(),
            "Alice".to_string(),
            "$argon2id$secret".to_string(),
        );
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["status"], UserStatus::Active.to_string());
    }

    #[test]
    fn test_transfer_response_skips_empty_note() {
        let transfer = Transfer {
            id: 1,
            sender_id: 1,
            recipient_id: 2,
            amount_cents: 500,
            note: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(TransferResponse::from(transfer)).unwrap();
        assert!(json.get("note").is_none());
    }
}
