//! User model
//!
//! A user carries exactly one [`Role`]. The role is the single source of
//! truth for every permission check; the derived group view returned by
//! [`User::group_memberships`] is always `{role}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, may be blank
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Global role
    pub role: Role,
    /// Inactive accounts cannot log in
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_reader(&self) -> bool {
        self.role == Role::Reader
    }

    pub fn is_journalist(&self) -> bool {
        self.role == Role::Journalist
    }

    pub fn is_editor(&self) -> bool {
        self.role == Role::Editor
    }

    /// Role groups this user belongs to, always exactly `{role}`
    pub fn group_memberships(&self) -> BTreeSet<Role> {
        BTreeSet::from([self.role])
    }

    /// Email trimmed of surrounding whitespace, `None` when blank
    pub fn contact_email(&self) -> Option<&str> {
        let email = self.email.trim();
        (!email.is_empty()).then_some(email)
    }
}

/// Global capability tier of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Journalist,
    Editor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Reader, Role::Journalist, Role::Editor];

    /// Resolve a free-form role label, ignoring case and surrounding whitespace
    pub fn resolve(raw: &str) -> Option<Role> {
        let normalized = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Journalist => "journalist",
            Role::Editor => "editor",
        }
    }

    /// Title-cased label for display
    pub fn label(&self) -> &'static str {
        match self {
            Role::Reader => "Reader",
            Role::Journalist => "Journalist",
            Role::Editor => "Editor",
        }
    }

    /// Whether accounts registering with this role start out active
    pub fn active_on_signup(&self) -> bool {
        matches!(self, Role::Reader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::resolve(s).ok_or_else(|| {
            ValidationError::new("role", format!("\"{}\" is not a valid role", s.trim()))
        })
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub role: Role,
}

impl CreateUserInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_role_resolve_is_case_and_space_insensitive() {
        assert_eq!(Role::resolve("Reader"), Some(Role::Reader));
        assert_eq!(Role::resolve("  JOURNALIST "), Some(Role::Journalist));
        assert_eq!(Role::resolve("editor\n"), Some(Role::Editor));
        assert_eq!(Role::resolve("admin"), None);
        assert_eq!(Role::resolve(""), None);
    }

    #[test]
    fn test_role_from_str_error_names_field() {
        let err = "publisher".parse::<Role>().unwrap_err();
        assert_eq!(err.field, "role");
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Journalist).unwrap(), "\"journalist\"");
        let role: Role = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(role, Role::Editor);
    }

    #[test]
    fn test_only_readers_active_on_signup() {
        assert!(Role::Reader.active_on_signup());
        assert!(!Role::Journalist.active_on_signup());
        assert!(!Role::Editor.active_on_signup());
    }

    #[test]
    fn test_contact_email_skips_blank() {
        let mut user = User::new("r".into(), "  ".into(), "h".into(), Role::Reader);
        assert_eq!(user.contact_email(), None);

        user.email = " r@example.com ".into();
        assert_eq!(user.contact_email(), Some("r@example.com"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("r".into(), "r@example.com".into(), "secret-hash".into(), Role::Reader);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Reader), Just(Role::Journalist), Just(Role::Editor)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn group_memberships_equal_role(first in role_strategy(), second in role_strategy()) {
            let mut user = User::new("u".into(), String::new(), "h".into(), first);
            prop_assert_eq!(user.group_memberships(), BTreeSet::from([first]));

            user.role = second;
            prop_assert_eq!(user.group_memberships(), BTreeSet::from([second]));
        }

        #[test]
        fn resolve_roundtrips_any_casing(role in role_strategy(), upper in any::<bool>(), pad in 0usize..3) {
            let label = if upper { role.as_str().to_uppercase() } else { role.label().to_string() };
            let raw = format!("{}{}{}", " ".repeat(pad), label, " ".repeat(pad));
            prop_assert_eq!(Role::resolve(&raw), Some(role));
        }
    }
}
