//! Publisher and publisher membership models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{required_text, Role, User, ValidationError};

/// Named content owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    pub id: i64,
    /// Unique name
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating a publisher
#[derive(Debug, Clone)]
pub struct NewPublisher {
    pub name: String,
    pub description: String,
}

impl NewPublisher {
    pub fn new(name: &str, description: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required_text("name", name, Some(255))?,
            description: description.trim().to_string(),
        })
    }
}

/// Role a user holds within one publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Editor,
    Journalist,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Editor => "editor",
            MemberRole::Journalist => "journalist",
        }
    }

    /// The global role a member must hold for this membership
    pub fn required_role(&self) -> Role {
        match self {
            MemberRole::Editor => Role::Editor,
            MemberRole::Journalist => Role::Journalist,
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "editor" => Ok(MemberRole::Editor),
            "journalist" => Ok(MemberRole::Journalist),
            other => Err(ValidationError::new(
                "member_role",
                format!("\"{}\" is not a valid choice.", other),
            )),
        }
    }
}

/// A (publisher, user, member_role) association
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherMembership {
    pub id: i64,
    pub publisher_id: i64,
    pub publisher_name: String,
    pub user_id: i64,
    pub username: String,
    pub member_role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Validated input for adding a member to a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMembership {
    pub publisher_id: i64,
    pub user_id: i64,
    pub member_role: MemberRole,
}

impl NewMembership {
    /// Only editors and journalists can be members, and the membership role
    /// must match the user's global role.
    pub fn new(
        publisher_id: i64,
        user: &User,
        member_role: MemberRole,
    ) -> Result<Self, ValidationError> {
        if user.is_reader() {
            return Err(ValidationError::new(
                "user",
                "Only Editor/Journalist users can be members of a publisher.",
            ));
        }
        if user.role != member_role.required_role() {
            return Err(ValidationError::new(
                "member_role",
                format!(
                    "This membership role requires the user to have the {} role.",
                    member_role.required_role().label()
                ),
            ));
        }
        Ok(Self {
            publisher_id,
            user_id: user.id,
            member_role,
        })
    }
}

/// Narrowing filters for membership listings
#[derive(Debug, Clone, Default)]
pub struct MembershipFilter {
    pub publisher_id: Option<i64>,
    pub user_id: Option<i64>,
    pub member_role: Option<MemberRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let mut user = User::new("u".into(), String::new(), "h".into(), role);
        user.id = 9;
        user
    }

    #[test]
    fn test_new_publisher_requires_name() {
        assert!(NewPublisher::new("   ", "desc").is_err());
        let publisher = NewPublisher::new("  Daily Planet ", " Metropolis ").unwrap();
        assert_eq!(publisher.name, "Daily Planet");
        assert_eq!(publisher.description, "Metropolis");
    }

    #[test]
    fn test_member_role_parse_case_insensitive() {
        assert_eq!("Editor".parse::<MemberRole>().unwrap(), MemberRole::Editor);
        assert_eq!(" JOURNALIST".parse::<MemberRole>().unwrap(), MemberRole::Journalist);
        assert!("reader".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_membership_role_must_match() {
        assert!(NewMembership::new(1, &user(Role::Editor), MemberRole::Editor).is_ok());
        assert!(NewMembership::new(1, &user(Role::Journalist), MemberRole::Journalist).is_ok());

        let err = NewMembership::new(1, &user(Role::Journalist), MemberRole::Editor).unwrap_err();
        assert_eq!(err.field, "member_role");
    }

    #[test]
    fn test_readers_cannot_be_members() {
        let err = NewMembership::new(1, &user(Role::Reader), MemberRole::Journalist).unwrap_err();
        assert_eq!(err.field, "user");
    }
}
