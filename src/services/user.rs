//! User service
//!
//! Accounts and sessions:
//! - Registration (readers are active immediately, journalists and editors
//!   wait for an administrator)
//! - Login/logout with expiring session tokens
//! - Administrative activation and role changes

use crate::config::MAX_SESSION_DAYS;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Role, Session, User, ValidationError};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials or inactive account)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What registration did with the new account
#[derive(Debug, Clone)]
pub enum Registration {
    /// Active reader, already signed in
    Active { user: User, session: Session },
    /// Journalist or editor awaiting activation
    PendingApproval(User),
}

impl Registration {
    pub fn user(&self) -> &User {
        match self {
            Registration::Active { user, .. } => user,
            Registration::PendingApproval(user) => user,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Registration::Active { .. } => "Account created successfully. You are now logged in.",
            Registration::PendingApproval(_) => {
                "Your account request has been submitted and is pending admin approval. \
                 You will be able to log in once approved."
            }
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
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
            session_expiration_days: session_expiration_days.clamp(1, MAX_SESSION_DAYS),
        }
    }

    /// Public self-registration.
    ///
    /// A reader is activated and signed in straight away. Journalist and
    /// editor accounts are stored inactive and cannot log in until an
    /// administrator activates them.
    pub async fn register(&self, input: CreateUserInput) -> Result<Registration, UserServiceError> {
        let active = input.role.active_on_signup();
        let user = self.create_user(input, active).await?;

        if !active {
            tracing::info!(user_id = user.id, role = %user.role, "Account awaiting activation");
            return Ok(Registration::PendingApproval(user));
        }

        let session = self.create_session(user.id).await?;
        Ok(Registration::Active { user, session })
    }

    /// Create an account with an explicit activation state
    pub async fn create_user(
        &self,
        input: CreateUserInput,
        active: bool,
    ) -> Result<User, UserServiceError> {
        let (username, email) = validate_user_input(&input)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(username, email, password_hash, input.role);
        user.is_active = active;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, active, "User created");
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Session, UserServiceError> {
        let user = self
            .find_user_by_username_or_email(username_or_email.trim())
            .await?
            .ok_or_else(|| UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()))?;

        let password_valid =
            verify_password(password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            tracing::warn!(user_id = user.id, "Login failed: wrong password");
            return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account is pending admin approval.".to_string(),
            ));
        }

        self.create_session(user.id).await
    }

    /// Invalidate a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens and for deactivated
    /// users. Expired sessions are removed on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
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

        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list(role).await.context("Failed to list users")?)
    }

    /// Activate or deactivate an account. Deactivation ends its sessions.
    pub async fn set_active(&self, username: &str, active: bool) -> Result<User, UserServiceError> {
        let mut user = self.require_user(username).await?;
        user.is_active = active;
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        if !active {
            self.session_repo
                .delete_by_user(updated.id)
                .await
                .context("Failed to delete sessions")?;
        }
        tracing::info!(user_id = updated.id, active, "Account activation changed");
        Ok(updated)
    }

    /// Change a user's global role
    pub async fn set_role(&self, username: &str, role: Role) -> Result<User, UserServiceError> {
        let mut user = self.require_user(username).await?;
        user.role = role;
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        tracing::info!(user_id = updated.id, role = %role, "Role changed");
        Ok(updated)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn require_user(&self, username: &str) -> Result<User, UserServiceError> {
        self.get_by_username(username)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(username.to_string()))
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

        Ok(self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, Duration::days(self.session_expiration_days));
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

/// Trimmed (username, email) after the required-field checks
fn validate_user_input(input: &CreateUserInput) -> Result<(String, String), ValidationError> {
    let username = input.username.trim();
    if username.is_empty() {
        return Err(ValidationError::new("username", "This field may not be blank."));
    }
    if username.chars().count() > 150 {
        return Err(ValidationError::new(
            "username",
            "Ensure this field has no more than 150 characters.",
        ));
    }

    let email = input.email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("email", "This field may not be blank."));
    }
    if !email.contains('@') {
        return Err(ValidationError::new("email", "Enter a valid email address."));
    }

    if input.password.is_empty() {
        return Err(ValidationError::new("password", "This field may not be blank."));
    }

    Ok((username.to_string(), email.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::DbPool;

    async fn setup_test_service() -> (DbPool, UserService) {
        let pool = migrated_pool().await;
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn input(username: &str, role: Role) -> CreateUserInput {
        CreateUserInput::new(username, format!("{}@example.com", username), "s3cret!", role)
    }

    #[tokio::test]
    async fn test_reader_registration_is_active_and_signed_in() {
        let (_pool, service) = setup_test_service().await;

        let registration = service.register(input("lois", Role::Reader)).await.unwrap();
        let Registration::Active { user, session } = registration else {
            panic!("reader should be active");
        };
        assert!(user.is_active);
        assert_eq!(session.user_id, user.id);
        assert_eq!(user.group_memberships().into_iter().collect::<Vec<_>>(), vec![Role::Reader]);
    }

    #[tokio::test]
    async fn test_staff_registration_waits_for_activation() {
        let (_pool, service) = setup_test_service().await;

        for (name, role) in [("clark", Role::Journalist), ("perry", Role::Editor)] {
            let registration = service.register(input(name, role)).await.unwrap();
            assert!(matches!(registration, Registration::PendingApproval(_)));
            assert!(!registration.user().is_active);

            let err = service.login(name, "s3cret!").await.unwrap_err();
            assert!(matches!(err, UserServiceError::AuthenticationError(_)));
        }

        service.set_active("clark", true).await.unwrap();
        assert!(service.login("clark", "s3cret!").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup_test_service().await;

        let cases = [
            (CreateUserInput::new("  ", "a@example.com", "pw", Role::Reader), "username"),
            (CreateUserInput::new("a", "", "pw", Role::Reader), "email"),
            (CreateUserInput::new("a", "not-an-email", "pw", Role::Reader), "email"),
            (CreateUserInput::new("a", "a@example.com", "", Role::Reader), "password"),
        ];
        for (case, field) in cases {
            match service.register(case).await.unwrap_err() {
                UserServiceError::ValidationError(err) => assert_eq!(err.field, field),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("lois", Role::Reader)).await.unwrap();

        let err = service.register(input("lois", Role::Reader)).await.unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists(_)));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("lois", Role::Reader)).await.unwrap();

        assert!(service.login("lois", "s3cret!").await.is_ok());
        assert!(service.login("LOIS@example.com", "s3cret!").await.is_ok());
        assert!(matches!(
            service.login("lois", "wrong").await.unwrap_err(),
            UserServiceError::AuthenticationError(_)
        ));
        assert!(matches!(
            service.login("nobody", "s3cret!").await.unwrap_err(),
            UserServiceError::AuthenticationError(_)
        ));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("lois", Role::Reader)).await.unwrap();
        let session = service.login("lois", "s3cret!").await.unwrap();

        let user = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(user.username, "lois");

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        // unknown token
        service.logout("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_session_lifetime_is_bounded() {
        let pool = migrated_pool().await;
        let service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            100_000_000,
        );
        let registration = service.register(input("lois", Role::Reader)).await.unwrap();
        let Registration::Active { session, .. } = registration else {
            panic!("readers are active on registration");
        };

        let limit = chrono::Utc::now() + Duration::days(MAX_SESSION_DAYS + 1);
        assert!(session.expires_at < limit);
        assert!(service.validate_session(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let registration = service.register(input("lois", Role::Reader)).await.unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let stale = Session::issue(registration.user().id, Duration::seconds(-5));
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deactivation_ends_sessions() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("lois", Role::Reader)).await.unwrap();
        let session = service.login("lois", "s3cret!").await.unwrap();

        service.set_active("lois", false).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_role_replaces_group() {
        let (_pool, service) = setup_test_service().await;
        service.create_user(input("jimmy", Role::Reader), true).await.unwrap();

        let user = service.set_role("jimmy", Role::Journalist).await.unwrap();
        assert_eq!(user.role, Role::Journalist);
        assert_eq!(user.group_memberships().len(), 1);
        assert!(user.group_memberships().contains(&Role::Journalist));

        assert!(matches!(
            service.set_role("ghost", Role::Editor).await.unwrap_err(),
            UserServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let (_pool, service) = setup_test_service().await;
        let user = service.create_user(input("lois", Role::Reader), true).await.unwrap();
        assert_ne!(user.password_hash, "s3cret!");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }
}
