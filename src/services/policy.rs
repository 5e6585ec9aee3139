//! Access policy
//!
//! Every gated operation is a [`Capability`]. [`authorize`] resolves the
//! caller's role once and checks the capability against it, failing closed:
//! a missing or inactive principal is always [`AccessError::Unauthenticated`].

use crate::models::{Article, ArticleVisibility, Newsletter, Role, User};

/// Operations that require a permission check
#[derive(Debug, Clone, Copy)]
pub enum Capability<'a> {
    ListArticles,
    CreateArticle,
    ReadArticle(&'a Article),
    MutateArticle(&'a Article),
    ApproveArticle,
    RejectArticle,
    /// The editorial queue of pending articles
    ReviewQueue,
    /// Creating subscriptions and reading the subscribed feed
    Subscribe,
    /// Deleting a subscription owned by `reader_id`
    MutateSubscription { reader_id: i64 },
    ListOwnSubscriptions,
    CreateNewsletter,
    MutateNewsletter(&'a Newsletter),
    /// Read-only access available to any signed-in user
    Browse,
}

/// Why a capability check failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
}

/// Effective role of a principal; `None` when anonymous or deactivated
pub fn role_of(principal: Option<&User>) -> Option<Role> {
    principal.filter(|user| user.is_active).map(|user| user.role)
}

/// Check `capability` for `principal`, handing back the authenticated user
pub fn authorize<'u>(
    principal: Option<&'u User>,
    capability: Capability<'_>,
) -> Result<&'u User, AccessError> {
    let user = principal
        .filter(|user| user.is_active)
        .ok_or(AccessError::Unauthenticated)?;

    match denial(user, capability) {
        None => Ok(user),
        Some(reason) => {
            tracing::warn!(user_id = user.id, role = %user.role, ?reason, "Access denied");
            Err(AccessError::Forbidden(reason))
        }
    }
}

/// Boolean form of [`authorize`]
pub fn permits(principal: Option<&User>, capability: Capability<'_>) -> bool {
    let Some(user) = principal.filter(|user| user.is_active) else {
        return false;
    };
    denial(user, capability).is_none()
}

fn denial(user: &User, capability: Capability<'_>) -> Option<&'static str> {
    let role = user.role;
    let editor = role == Role::Editor;

    let allowed = match capability {
        Capability::ListArticles | Capability::Browse => true,
        Capability::CreateArticle => role == Role::Journalist,
        Capability::ReadArticle(article) => article.approved || editor,
        Capability::MutateArticle(article) => editor || article.author_id == user.id,
        Capability::ApproveArticle | Capability::RejectArticle | Capability::ReviewQueue => editor,
        Capability::Subscribe | Capability::ListOwnSubscriptions => role == Role::Reader,
        Capability::MutateSubscription { reader_id } => editor || reader_id == user.id,
        Capability::CreateNewsletter => matches!(role, Role::Journalist | Role::Editor),
        Capability::MutateNewsletter(newsletter) => editor || newsletter.author_id == user.id,
    };

    if allowed {
        return None;
    }

    Some(match capability {
        Capability::CreateArticle => "Journalist role required.",
        Capability::ReadArticle(_) => "You do not have permission to view this article.",
        Capability::ApproveArticle | Capability::RejectArticle | Capability::ReviewQueue => {
            "Editor role required."
        }
        Capability::Subscribe | Capability::ListOwnSubscriptions => "Reader role required.",
        Capability::CreateNewsletter => "Journalist or Editor role required.",
        Capability::MutateNewsletter(_) => "You do not have permission to modify this newsletter.",
        Capability::MutateArticle(_)
        | Capability::MutateSubscription { .. }
        | Capability::ListArticles
        | Capability::Browse => "You do not have permission to access this resource.",
    })
}

/// Base set of articles `user` may list
pub fn visibility_for(user: &User) -> ArticleVisibility {
    match user.role {
        Role::Editor => ArticleVisibility::All,
        Role::Journalist => ArticleVisibility::ApprovedOrAuthoredBy(user.id),
        Role::Reader => ArticleVisibility::ApprovedOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn user(id: i64, role: Role) -> User {
        let mut user = User::new(format!("u{}", id), String::new(), "h".into(), role);
        user.id = id;
        user
    }

    fn article(author_id: i64, approved: bool) -> Article {
        Article {
            id: 1,
            title: "t".into(),
            content: "c".into(),
            author_id,
            author_username: "a".into(),
            publisher_id: None,
            publisher_name: None,
            approved,
            approved_at: None,
            approved_by_id: None,
            approved_by_username: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unauthenticated_denied_everything() {
        let pending = article(1, false);
        for cap in [
            Capability::ListArticles,
            Capability::Browse,
            Capability::ReadArticle(&pending),
            Capability::ApproveArticle,
        ] {
            assert_eq!(authorize(None, cap).unwrap_err(), AccessError::Unauthenticated);
        }
    }

    #[test]
    fn test_inactive_user_is_unauthenticated() {
        let mut editor = user(1, Role::Editor);
        editor.is_active = false;
        assert_eq!(role_of(Some(&editor)), None);
        assert_eq!(
            authorize(Some(&editor), Capability::ApproveArticle).unwrap_err(),
            AccessError::Unauthenticated
        );
    }

    #[test]
    fn test_only_editors_approve_and_reject() {
        assert!(permits(Some(&user(1, Role::Editor)), Capability::ApproveArticle));
        assert!(permits(Some(&user(1, Role::Editor)), Capability::RejectArticle));
        for role in [Role::Reader, Role::Journalist] {
            let err = authorize(Some(&user(1, role)), Capability::ApproveArticle).unwrap_err();
            assert_eq!(err, AccessError::Forbidden("Editor role required."));
        }
    }

    #[test]
    fn test_pending_article_readable_by_editor_only() {
        let pending = article(2, false);
        assert!(permits(Some(&user(1, Role::Editor)), Capability::ReadArticle(&pending)));
        // not even the author
        assert!(!permits(Some(&user(2, Role::Journalist)), Capability::ReadArticle(&pending)));
        assert!(!permits(Some(&user(3, Role::Reader)), Capability::ReadArticle(&pending)));

        let approved = article(2, true);
        assert!(permits(Some(&user(3, Role::Reader)), Capability::ReadArticle(&approved)));
    }

    #[test]
    fn test_article_mutation_by_author_or_editor() {
        let own = article(2, false);
        assert!(permits(Some(&user(2, Role::Journalist)), Capability::MutateArticle(&own)));
        assert!(permits(Some(&user(9, Role::Editor)), Capability::MutateArticle(&own)));
        assert!(!permits(Some(&user(3, Role::Journalist)), Capability::MutateArticle(&own)));
    }

    #[test]
    fn test_subscription_ownership() {
        assert!(permits(Some(&user(5, Role::Reader)), Capability::MutateSubscription { reader_id: 5 }));
        assert!(!permits(Some(&user(6, Role::Reader)), Capability::MutateSubscription { reader_id: 5 }));
        assert!(permits(Some(&user(7, Role::Editor)), Capability::MutateSubscription { reader_id: 5 }));
    }

    #[test]
    fn test_visibility_for_roles() {
        assert_eq!(visibility_for(&user(1, Role::Editor)), ArticleVisibility::All);
        assert_eq!(
            visibility_for(&user(4, Role::Journalist)),
            ArticleVisibility::ApprovedOrAuthoredBy(4)
        );
        assert_eq!(visibility_for(&user(1, Role::Reader)), ArticleVisibility::ApprovedOnly);
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Reader), Just(Role::Journalist), Just(Role::Editor)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn approval_requires_editor(role in role_strategy(), id in 1i64..1000) {
            let principal = user(id, role);
            prop_assert_eq!(
                permits(Some(&principal), Capability::ApproveArticle),
                role == Role::Editor
            );
        }

        #[test]
        fn only_journalists_create_articles(role in role_strategy()) {
            let principal = user(1, role);
            prop_assert_eq!(
                permits(Some(&principal), Capability::CreateArticle),
                role == Role::Journalist
            );
        }

        #[test]
        fn newsletter_mutation_matches_ownership(role in role_strategy(), author in 1i64..5, caller in 1i64..5) {
            let newsletter = Newsletter {
                id: 1,
                title: "n".into(),
                description: String::new(),
                author_id: author,
                author_username: "a".into(),
                article_ids: vec![],
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let principal = user(caller, role);
            prop_assert_eq!(
                permits(Some(&principal), Capability::MutateNewsletter(&newsletter)),
                role == Role::Editor || author == caller
            );
        }
    }
}
