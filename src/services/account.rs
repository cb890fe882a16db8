//! Account service
//!
//! Implements business logic for user accounts:
//! - Registration with email uniqueness and password rules
//! - Credential login, throttled by the login guard
//! - Session management (create, validate, logout, cleanup)
//! - Profile and password updates
//!
//! Login never reveals whether an email is registered: unknown identity,
//! wrong password, and suspended accounts all surface as `InvalidCredentials`.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::login_guard::{LoginGuard, LoginOutcome};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Minimum accepted password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Error types for account service operations
#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    /// Credentials rejected (wrong password or unknown email)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The login guard tripped; the caller already paid the penalty delay
    #[error("Too many failed login attempts")]
    TooManyAttempts,

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Email already registered
    #[error("Email '{0}' is already registered")]
    EmailTaken(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Account service for managing users, authentication, and sessions
pub struct AccountService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    login_guard: Arc<LoginGuard>,
    session_expiration_days: i64,
}

impl AccountService {
    /// Create a new account service with the given repositories and guard
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        login_guard: Arc<LoginGuard>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            login_guard,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Create a new account service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        login_guard: Arc<LoginGuard>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            login_guard,
            session_expiration_days,
        }
    }

    /// Register a new user.
    ///
    /// The email is normalized to lower case and must be unique. Passwords
    /// must be at least eight characters; they are stored as Argon2id hashes.
    ///
    /// # Errors
    ///
    /// - `Validation` if the email, display name, or password is invalid
    /// - `EmailTaken` if the email is already registered
    /// - `Internal` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, AccountServiceError> {
        let email = input.email.trim().to_lowercase();
        let display_name = input.display_name.trim().to_string();

        validate_email(&email)?;
        if display_name.is_empty() {
            return Err(AccountServiceError::Validation(
                "Display name cannot be empty".to_string(),
            ));
        }
        if input.password.len() < MIN_PASSWORD_LENGTH {
            return Err(AccountServiceError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AccountServiceError::EmailTaken(email));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = User::new(email, display_name, password_hash);
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, "user registered");

        Ok(created)
    }

    /// Login with credentials.
    ///
    /// The whole attempt runs through the login guard. The credential check
    /// itself looks the user up by email and verifies the password; unknown
    /// email, wrong password, suspended account, and lookup errors are all
    /// indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the attempt was rejected
    /// - `TooManyAttempts` if the lockout tripped
    /// - `Internal` for database errors after successful verification
    pub async fn login(&self, input: LoginInput) -> Result<Session, AccountServiceError> {
        let identity = input.email.trim().to_lowercase();

        let verify = {
            let user_repo = self.user_repo.clone();
            let identity = identity.clone();
            let password = input.password;
            async move {
                match user_repo.get_by_email(&identity).await {
                    Ok(Some(user)) if user.is_active() => {
                        verify_password(&password, &user.password_hash).unwrap_or(false)
                    }
                    Ok(_) => false,
                    Err(e) => {
                        tracing::error!(error = %e, "user lookup failed during login");
                        false
                    }
                }
            }
        };

        match self.login_guard.check_and_record(&identity, verify).await {
            LoginOutcome::Authenticated => {
                let user = self
                    .user_repo
                    .get_by_email(&identity)
                    .await
                    .context("Failed to load user after authentication")?
                    .ok_or_else(|| anyhow::anyhow!("User vanished after authentication"))?;
                self.create_session(user.id).await
            }
            LoginOutcome::Rejected { .. } => Err(AccountServiceError::InvalidCredentials),
            LoginOutcome::Locked => Err(AccountServiceError::TooManyAttempts),
        }
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), AccountServiceError> {
        self.session_repo
            .revoke(session_id)
            .await
            .context("Failed to revoke session")?;

        Ok(())
    }

    /// Validate session token and return the associated user.
    ///
    /// Returns `None` if the session does not exist or has expired. Expired
    /// sessions are deleted on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, AccountServiceError> {
        let session = match self
            .session_repo
            .find_by_token(token)
            .await
            .context("Failed to look up session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.revoke(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, AccountServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;

        Ok(user)
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AccountServiceError> {
        let user = self
            .user_repo
            .get_by_email(&email.trim().to_lowercase())
            .await
            .context("Failed to get user by email")?;

        Ok(user)
    }

    /// List users with pagination
    pub async fn list_users(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<User>, i64), AccountServiceError> {
        let result = self
            .user_repo
            .list(page, per_page)
            .await
            .context("Failed to list users")?;

        Ok(result)
    }

    /// Update a user's display name
    pub async fn update_profile(
        &self,
        user_id: i64,
        display_name: &str,
    ) -> Result<User, AccountServiceError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AccountServiceError::Validation(
                "Display name cannot be empty".to_string(),
            ));
        }

        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AccountServiceError::Validation("User not found".to_string()))?;

        user.display_name = display_name.to_string();
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        Ok(updated)
    }

    /// Change a user's password after verifying the current one.
    ///
    /// All existing sessions for the user are revoked.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountServiceError> {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(AccountServiceError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AccountServiceError::Validation("User not found".to_string()))?;

        let current_valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !current_valid {
            return Err(AccountServiceError::InvalidCredentials);
        }

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        self.session_repo
            .revoke_all_for_user(user_id)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!(user_id, "password changed, sessions revoked");

        Ok(())
    }

    /// Delete expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, AccountServiceError> {
        let deleted = self
            .session_repo
            .purge_expired()
            .await
            .context("Failed to purge expired sessions")?;

        if deleted > 0 {
            tracing::debug!(deleted, "cleaned up expired sessions");
        }

        Ok(deleted)
    }

    /// Create a new session for a user.
    ///
    /// Registration uses this directly so a fresh signup does not go through
    /// the login guard.
    pub async fn create_session(&self, user_id: i64) -> Result<Session, AccountServiceError> {
        let session = Session::issue(user_id, self.session_expiration_days);

        let created = self
            .session_repo
            .insert(&session)
            .await
            .context("Failed to store session")?;

        Ok(created)
    }
}

/// Minimal email shape check. Real validation happens when mail is sent;
/// this only rejects obvious garbage.
fn validate_email(email: &str) -> Result<(), AccountServiceError> {
    let valid = email.len() >= 3
        && email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.contains(' ');
    if !valid {
        return Err(AccountServiceError::Validation(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(())
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            password: password.into(),
        }
    }
}

/// Login input
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleConfig;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserStatus;

    fn test_guard() -> Arc<LoginGuard> {
        Arc::new(LoginGuard::new(&ThrottleConfig {
            max_attempts: 4,
            lockout_window_secs: 1800,
            penalty_delay_secs: 60,
            sweep_interval_secs: 300,
        }))
    }

    async fn setup_test_service() -> AccountService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        AccountService::new(user_repo, session_repo, test_guard())
    }

    async fn setup_test_service_with_expiration(days: i64) -> AccountService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        AccountService::with_session_expiration(user_repo, session_repo, test_guard(), days)
    }

    #[tokio::test]
    async fn test_register_creates_user() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        assert!(user.id > 0);
        assert_eq!(user.email, "bob@x.com");
        assert_eq!(user.display_name, "Bob");
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("  Bob@Example.COM ", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        assert_eq!(user.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_email() {
        let service = setup_test_service().await;

        let result = service
            .register(RegisterInput::new("not-an-email", "Bob", "password123"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let service = setup_test_service().await;

        let result = service
            .register(RegisterInput::new("bob@x.com", "Bob", "short"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_display_name() {
        let service = setup_test_service().await;

        let result = service
            .register(RegisterInput::new("bob@x.com", "   ", "password123"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("First registration should succeed");

        let result = service
            .register(RegisterInput::new("BOB@x.com", "Other Bob", "password456"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_login_with_valid_credentials() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        assert_eq!(session.user_id, user.id);
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_on_email() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("BOB@X.COM", "password123"))
            .await
            .expect("Login should succeed regardless of email case");

        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_login_wrong_password_rejected() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let result = service
            .login(LoginInput::new("bob@x.com", "wrong_password"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_indistinguishable_from_wrong_password() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let unknown = service
            .login(LoginInput::new("nobody@x.com", "password123"))
            .await;
        let wrong = service
            .login(LoginInput::new("bob@x.com", "wrong_password"))
            .await;

        assert!(matches!(unknown, Err(AccountServiceError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AccountServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_suspended_user_rejected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service =
            AccountService::new(user_repo.clone(), session_repo, test_guard());

        let mut user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        user.status = UserStatus::Suspended;
        user_repo.update(&user).await.expect("Failed to suspend user");

        // Correct password, but the account is suspended
        let result = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await;

        assert!(matches!(result, Err(AccountServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_locks_after_repeated_failures() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        for _ in 0..3 {
            let result = service
                .login(LoginInput::new("bob@x.com", "wrong_password"))
                .await;
            assert!(matches!(result, Err(AccountServiceError::InvalidCredentials)));
        }

        let result = service
            .login(LoginInput::new("bob@x.com", "wrong_password"))
            .await;
        assert!(matches!(result, Err(AccountServiceError::TooManyAttempts)));

        // The lockout cleared the record; correct credentials work again
        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed after lockout reset");
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_successful_login_resets_failure_count() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        for _ in 0..2 {
            let _ = service
                .login(LoginInput::new("bob@x.com", "wrong_password"))
                .await;
        }

        service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        // Three more failures are needed before another lockout
        for _ in 0..3 {
            let result = service
                .login(LoginInput::new("bob@x.com", "wrong_password"))
                .await;
            assert!(matches!(result, Err(AccountServiceError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn test_validate_session_returns_user() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation should not error")
            .expect("Session should be valid");

        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn test_validate_session_unknown_token() {
        let service = setup_test_service().await;

        let validated = service
            .validate_session("no-such-token")
            .await
            .expect("Validation should not error");

        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_validate_expired_session() {
        let service = setup_test_service_with_expiration(-1).await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        assert!(session.is_expired());

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation should not error");
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup_test_service().await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        service.logout(&session.id).await.expect("Logout should succeed");

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation should not error");
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let service = setup_test_service_with_expiration(-1).await;

        service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        let deleted = service
            .cleanup_expired_sessions()
            .await
            .expect("Cleanup should succeed");
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let updated = service
            .update_profile(user.id, "Robert")
            .await
            .expect("Update should succeed");

        assert_eq!(updated.display_name, "Robert");
    }

    #[tokio::test]
    async fn test_update_profile_rejects_empty_name() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let result = service.update_profile(user.id, "  ").await;
        assert!(matches!(result, Err(AccountServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_change_password() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let session = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await
            .expect("Login should succeed");

        service
            .change_password(user.id, "password123", "new_password456")
            .await
            .expect("Password change should succeed");

        // Old sessions are revoked
        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Validation should not error");
        assert!(validated.is_none());

        // Old password no longer works, new one does
        let old = service
            .login(LoginInput::new("bob@x.com", "password123"))
            .await;
        assert!(matches!(old, Err(AccountServiceError::InvalidCredentials)));

        service
            .login(LoginInput::new("bob@x.com", "new_password456"))
            .await
            .expect("Login with new password should succeed");
    }

    #[tokio::test]
    async fn test_change_password_wrong_current() {
        let service = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("bob@x.com", "Bob", "password123"))
            .await
            .expect("Registration should succeed");

        let result = service
            .change_password(user.id, "not_the_password", "new_password456")
            .await;

        assert!(matches!(result, Err(AccountServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_list_users_paginated() {
        let service = setup_test_service().await;

        for i in 1..=3 {
            service
                .register(RegisterInput::new(
                    format!("user{}@x.com", i),
                    format!("User {}", i),
                    "password123",
                ))
                .await
                .expect("Registration should succeed");
        }

        let (users, total) = service
            .list_users(1, 2)
            .await
            .expect("Listing should succeed");
        assert_eq!(users.len(), 2);
        assert_eq!(total, 3);
    }
}
