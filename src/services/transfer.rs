//! Transfer service
//!
//! Business logic for peer-to-peer transfers. A transfer is an append-only
//! record of value moving between two accounts; amounts must be positive and
//! the recipient must be an existing, different user. Balances are not
//! tracked, so no debit check happens here.

use crate::db::repositories::{TransferRepository, UserRepository};
use crate::models::Transfer;
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of the optional transfer note
const MAX_NOTE_LENGTH: usize = 500;

/// Error types for transfer service operations
#[derive(Debug, thiserror::Error)]
pub enum TransferServiceError {
    /// Validation error (invalid amount, note, or participants)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Recipient email is not registered
    #[error("Recipient not found")]
    RecipientNotFound,

    /// Transfer does not exist or the caller is not a participant
    #[error("Transfer not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Transfer service
pub struct TransferService {
    transfer_repo: Arc<dyn TransferRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl TransferService {
    /// Create a new transfer service
    pub fn new(
        transfer_repo: Arc<dyn TransferRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            transfer_repo,
            user_repo,
        }
    }

    /// Record a transfer from `sender_id` to the user registered under
    /// `recipient_email`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive, the note is too long,
    ///   or sender and recipient are the same user
    /// - `RecipientNotFound` if no user is registered under the email
    /// - `Internal` for database errors
    pub async fn create_transfer(
        &self,
        sender_id: i64,
        recipient_email: &str,
        amount_cents: i64,
        note: Option<String>,
    ) -> Result<Transfer, TransferServiceError> {
        if amount_cents <= 0 {
            return Err(TransferServiceError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        let note = match note {
            Some(n) => {
                let n = n.trim().to_string();
                if n.len() > MAX_NOTE_LENGTH {
                    return Err(TransferServiceError::Validation(format!(
                        "Note must be at most {} characters",
                        MAX_NOTE_LENGTH
                    )));
                }
                if n.is_empty() {
                    None
                } else {
                    Some(n)
                }
            }
            None => None,
        };

        let recipient = self
            .user_repo
            .get_by_email(&recipient_email.trim().to_lowercase())
            .await
            .context("Failed to look up recipient")?
            .ok_or(TransferServiceError::RecipientNotFound)?;

        if recipient.id == sender_id {
            return Err(TransferServiceError::Validation(
                "Cannot transfer to yourself".to_string(),
            ));
        }

        let transfer = Transfer::new(sender_id, recipient.id, amount_cents, note);
        let created = self
            .transfer_repo
            .create(&transfer)
            .await
            .context("Failed to create transfer")?;

        tracing::info!(
            transfer_id = created.id,
            sender_id,
            recipient_id = recipient.id,
            amount_cents,
            "transfer recorded"
        );

        Ok(created)
    }

    /// Get a transfer by ID, visible only to its participants
    pub async fn get_transfer(
        &self,
        id: i64,
        requester_id: i64,
    ) -> Result<Transfer, TransferServiceError> {
        let transfer = self
            .transfer_repo
            .get_by_id(id)
            .await
            .context("Failed to get transfer")?
            .ok_or(TransferServiceError::NotFound)?;

        // Non-participants see the same error as a missing row
        if !transfer.involves(requester_id) {
            return Err(TransferServiceError::NotFound);
        }

        Ok(transfer)
    }

    /// List transfers the user sent or received, newest first
    pub async fn list_for_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Transfer>, i64), TransferServiceError> {
        let result = self
            .transfer_repo
            .list_for_user(user_id, page, per_page)
            .await
            .context("Failed to list transfers")?;

        Ok(result)
    }

    /// Count transfers the user sent or received
    pub async fn count_for_user(&self, user_id: i64) -> Result<i64, TransferServiceError> {
        let count = self
            .transfer_repo
            .count_for_user(user_id)
            .await
            .context("Failed to count transfers")?;

        Ok(count)
    }
}
