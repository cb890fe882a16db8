//! Transfer endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PaginatedTransfersResponse, TransferResponse};
use crate::services::TransferServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/{id}", get(get_transfer))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub recipient_email: String,
    pub amount_cents: i64,
    pub note: Option<String>,
}

fn map_transfer_error(err: TransferServiceError) -> ApiError {
    match err {
        TransferServiceError::Validation(msg) => ApiError::validation_error(&msg),
        TransferServiceError::RecipientNotFound => ApiError::not_found("Recipient not found"),
        TransferServiceError::NotFound => ApiError::not_found("Transfer not found"),
        TransferServiceError::Internal(e) => {
            tracing::error!(error = %e, "Transfer service error");
            ApiError::internal_error("Internal server error")
        }
    }
}

/// POST /transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<Response, ApiError> {
    let transfer = state
        .transfer_service
        .create_transfer(
            user.id,
            &payload.recipient_email,
            payload.amount_cents,
            payload.note,
        )
        .await
        .map_err(map_transfer_error)?;

    Ok((StatusCode::CREATED, Json(TransferResponse::from(transfer))).into_response())
}

/// GET /transfers
pub async fn list_transfers(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedTransfersResponse>, ApiError> {
    let (page, per_page) = query.clamped();

    let (transfers, total) = state
        .transfer_service
        .list_for_user(user.id, page, per_page)
        .await
        .map_err(map_transfer_error)?;

    Ok(Json(PaginatedTransfersResponse {
        transfers: transfers.into_iter().map(TransferResponse::from).collect(),
        total,
        page,
        per_page,
    }))
}

/// GET /transfers/{id}
///
/// Visible only to the sender and the recipient; anyone else sees 404.
pub async fn get_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfer = state
        .transfer_service
        .get_transfer(id, user.id)
        .await
        .map_err(map_transfer_error)?;

    Ok(Json(TransferResponse::from(transfer)))
}
