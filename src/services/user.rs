//! User service
//!
//! Accounts, login sessions and roles:
//! - registration (the first account becomes `admin`, later ones `user`)
//! - login/logout with server-side sessions
//! - session validation for the auth middleware
//! - role management for the back office

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Loose email shape check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new account.
    ///
    /// The very first account gets the `admin` role so a fresh install can
    /// reach the back office; everybody else starts as `user`.
    ///
    /// # Errors
    /// - `ValidationError` for a malformed email or a short password
    /// - `UserExists` when the email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        let email = input.email.trim().to_lowercase();
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let full_name = input
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let user = User::new(email, password_hash, full_name, role);
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown emails and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        let session = Session::issue(user.id, self.session_expiration_days);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    /// Delete the session. Unknown tokens are not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired sessions are removed and
    /// yield `None`.
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
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        let users = self.user_repo.list().await.context("Failed to list users")?;
        Ok(users)
    }

    /// Change a user's role. Demoting from staff also ends their sessions so
    /// back-office access stops immediately.
    pub async fn change_role(&self, id: i64, role: UserRole) -> Result<User, UserServiceError> {
        let user = self
            .user_repo
            .update_role(id, role)
            .await
            .context("Failed to update role")?
            .ok_or(UserServiceError::NotFound(id))?;

        if !role.is_staff() {
            self.session_repo
                .delete_by_user(id)
                .await
                .context("Failed to revoke sessions")?;
        }

        tracing::info!(user_id = id, role = %role, "User role changed");
        Ok(user)
    }

    /// Delete expired sessions; returns how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    if input.email.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if !is_valid_email(&input.email) {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

impl RegisterInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

/// Input for user login
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
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::{Duration, Utc};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        (pool, UserService::new(user_repo, session_repo))
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (_pool, service) = setup_test_service().await;

        let first = service
            .register(RegisterInput::new("dueña@agencia.mx", "password123").with_full_name("Lucía"))
            .await
            .unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.full_name.as_deref(), Some("Lucía"));

        let second = service
            .register(RegisterInput::new("cliente@correo.mx", "password456"))
            .await
            .unwrap();
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup_test_service().await;

        let short = service.register(RegisterInput::new("a@b.mx", "corta")).await;
        assert!(matches!(short, Err(UserServiceError::ValidationError(_))));

        let bad_email = service.register(RegisterInput::new("sin-arroba", "password123")).await;
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let empty = service.register(RegisterInput::new("  ", "password123")).await;
        assert!(matches!(empty, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_case_insensitive() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();

        let result = service
            .register(RegisterInput::new("ANA@viajes.mx", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();

        let (logged_in, session) = service
            .login(LoginInput::new("Ana@Viajes.mx", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.email, "ana@viajes.mx");

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();

        let wrong = service.login(LoginInput::new("ana@viajes.mx", "otra-clave")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let unknown = service.login(LoginInput::new("nadie@viajes.mx", "password123")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();

        let session_repo = SqlxSessionRepository::new(pool.clone());
        let mut expired = Session::issue(user.id, 1);
        expired.expires_at = Utc::now() - Duration::hours(1);
        session_repo.create(&expired).await.unwrap();

        assert!(service.validate_session(&expired.id).await.unwrap().is_none());
        assert!(session_repo.get_by_id(&expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();
        let session_repo = SqlxSessionRepository::new(pool.clone());
        for _ in 0..2 {
            let mut expired = Session::issue(user.id, 1);
            expired.expires_at = Utc::now() - Duration::minutes(5);
            session_repo.create(&expired).await.unwrap();
        }
        let (_, live) = service
            .login(LoginInput::new("ana@viajes.mx", "password123"))
            .await
            .unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 2);
        assert!(service.validate_session(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_change_role_revokes_sessions_on_demotion() {
        let (_pool, service) = setup_test_service().await;
        service
            .register(RegisterInput::new("admin@agencia.mx", "password123"))
            .await
            .unwrap();
        let editor = service
            .register(RegisterInput::new("editor@agencia.mx", "password123"))
            .await
            .unwrap();

        let promoted = service.change_role(editor.id, UserRole::Editor).await.unwrap();
        assert_eq!(promoted.role, UserRole::Editor);

        let (_, session) = service
            .login(LoginInput::new("editor@agencia.mx", "password123"))
            .await
            .unwrap();
        service.change_role(editor.id, UserRole::User).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());

        let missing = service.change_role(999, UserRole::Admin).await;
        assert!(matches!(missing, Err(UserServiceError::NotFound(999))));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("ana@viajes.mx"));
        assert!(is_valid_email(" ana.perez+reservas@correo.com.mx "));
        assert!(!is_valid_email("ana@viajes"));
        assert!(!is_valid_email("ana viajes@correo.mx"));
        assert!(!is_valid_email("@correo.mx"));
    }
}
