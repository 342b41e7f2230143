//! User service
//!
//! Implements business logic for accounts:
//! - Registration (the first user becomes admin, later users are students)
//! - Login/logout with session tokens
//! - Session validation and HTTP Basic authentication
//! - Role changes by an admin

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, UserRole};
use crate::services::password::{hash_password, password_problems, verify_password};
use anyhow::Context;
use chrono::Duration;
use data_encoding::BASE64;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl: Duration::days(session_expiration_days),
        }
    }

    /// Lifetime of new sessions
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Register a new user
    ///
    /// The first user in the system always becomes admin. Otherwise the role
    /// requested in `input` is used, defaulting to student.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if a field is empty, the email is malformed or the
    ///   password breaks the password policy
    /// - `UserExists` if username or email is already taken
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            input.role.unwrap_or_default()
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, input.email, password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, role = %created.role, "User registered");
        Ok(created)
    }

    /// Login with username or email and password, starting a new session.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .check_credentials(&input.username_or_email, &input.password)
            .await?
            .ok_or_else(|| {
                tracing::debug!(login = %input.username_or_email, "Login rejected");
                UserServiceError::AuthenticationError("Invalid username or password".to_string())
            })?;

        self.start_session(user.id).await
    }

    /// Start a session for an already authenticated user
    pub async fn start_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::new(user_id, self.session_ttl);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Validate session token and return the associated user
    ///
    /// Returns `None` if the session doesn't exist or has expired. Expired
    /// sessions are deleted on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Authenticate the credentials of an HTTP Basic `Authorization` header.
    ///
    /// `encoded` is the part after `Basic `. Malformed credentials are
    /// treated like wrong ones.
    pub async fn authenticate_basic(&self, encoded: &str) -> Result<Option<User>, UserServiceError> {
        let Ok(decoded) = BASE64.decode(encoded.trim().as_bytes()) else {
            return Ok(None);
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return Ok(None);
        };
        let Some((username, password)) = decoded.split_once(':') else {
            return Ok(None);
        };
        self.check_credentials(username, password).await
    }

    /// Check if this is the first user (for auto-admin)
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;

        Ok(count == 0)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;

        Ok(user)
    }

    /// Change the role of a user
    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let updated = self
            .user_repo
            .update_role(id, role)
            .await
            .context("Failed to update user role")?;
        if !updated {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(user_id = id, role = %role, "User role changed");
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    fn validate_register_input(&self, input: &CreateUserInput) -> Result<(), UserServiceError> {
        if input.username.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }

        if input.username.chars().count() > 150 {
            return Err(UserServiceError::ValidationError(
                "Username cannot be longer than 150 characters".to_string(),
            ));
        }

        if input.email.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "Email cannot be empty".to_string(),
            ));
        }

        if !input.email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        let problems = password_problems(&input.password);
        if !problems.is_empty() {
            return Err(UserServiceError::ValidationError(problems.join(" ")));
        }

        Ok(())
    }

    /// The user matching the credentials, or `None`
    async fn check_credentials(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let Some(user) = self.find_user_by_username_or_email(username_or_email).await? else {
            return Ok(None);
        };

        let valid = verify_password(password, &user.password_hash).context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?;

        Ok(user)
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}
