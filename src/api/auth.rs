//! Authentication and account endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::services::{AccountServiceError, LoginInput, RegisterInput};

/// Routes that do not require authentication
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes that require a valid session
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

const SESSION_COOKIE_MAX_AGE: i64 = 7 * 24 * 60 * 60;

fn session_cookie(token: &str) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, SESSION_COOKIE_MAX_AGE
    )
}

fn clear_session_cookie() -> String {
    "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0".to_string()
}

fn map_account_error(err: AccountServiceError) -> ApiError {
    match err {
        // Same generic message for unknown email and wrong password
        AccountServiceError::InvalidCredentials => {
            ApiError::unauthorized("Invalid email or password")
        }
        // No attempt counts or lockout duration in the response
        AccountServiceError::TooManyAttempts => {
            ApiError::rate_limit("Too many login attempts, please try again later")
        }
        AccountServiceError::Validation(msg) => ApiError::validation_error(&msg),
        AccountServiceError::EmailTaken(_) => ApiError::conflict("Email is already registered"),
        AccountServiceError::Internal(e) => {
            tracing::error!(error = %e, "Account service error");
            ApiError::internal_error("Internal server error")
        }
    }
}

/// POST /auth/register
///
/// Creates the account and a session in one step, so a fresh signup does not
/// go through the login throttle.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let user = state
        .account_service
        .register(RegisterInput::new(
            payload.email,
            payload.display_name,
            payload.password,
        ))
        .await
        .map_err(map_account_error)?;

    let session = state
        .account_service
        .create_session(user.id)
        .await
        .map_err(map_account_error)?;

    let response = (
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session.id))],
        Json(AuthResponse {
            user: UserResponse::from(user),
            token: session.id,
        }),
    );
    Ok(response.into_response())
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .account_service
        .login(LoginInput::new(payload.email, payload.password))
        .await
        .map_err(map_account_error)?;

    let user = state
        .account_service
        .get_by_id(session.user_id)
        .await
        .map_err(map_account_error)?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let response = (
        [(header::SET_COOKIE, session_cookie(&session.id))],
        Json(AuthResponse {
            user: UserResponse::from(user),
            token: session.id,
        }),
    );
    Ok(response.into_response())
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state
            .account_service
            .logout(&token)
            .await
            .map_err(map_account_error)?;
    }

    let response = (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    );
    Ok(response.into_response())
}

/// GET /auth/me
pub async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// PUT /auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .account_service
        .update_profile(user.id, &payload.display_name)
        .await
        .map_err(map_account_error)?;

    Ok(Json(UserResponse::from(updated)))
}

/// PUT /auth/password
///
/// Revokes all sessions on success; the client must log in again.
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .account_service
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await
        .map_err(map_account_error)?;

    Ok(StatusCode::NO_CONTENT)
}
