//! User directory endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{PaginatedUsersResponse, UserResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedUsersResponse>, ApiError> {
    let (page, per_page) = query.clamped();

    let (users, total) = state
        .account_service
        .list_users(page, per_page)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list users");
            ApiError::internal_error("Failed to list users")
        })?;

    Ok(Json(PaginatedUsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        page,
        per_page,
    }))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .account_service
        .get_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get user");
            ApiError::internal_error("Failed to get user")
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}
