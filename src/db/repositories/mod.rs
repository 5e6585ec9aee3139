//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod article;
pub mod membership;
pub mod newsletter;
pub mod publisher;
pub mod session;
pub mod subscription;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use membership::{MembershipRepository, SqlxMembershipRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use publisher::{PublisherRepository, SqlxPublisherRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
pub use user::{SqlxUserRepository, UserRepository};
