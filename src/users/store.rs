use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::model::{Subscription, User};

/// Fields a profile update may touch. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub language: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(User),
    NotFound,
    EmailTaken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(User),
    /// The provider event id was seen before; nothing changed.
    Duplicate,
    UserNotFound,
    /// A trial tier for a user whose trial is spent. The event is recorded, the record is not touched.
    TrialAlreadyUsed,
}

/// Which user a provider event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscriber<'a> {
    Id(Uuid),
    Email(&'a str),
}

impl Subscriber<'_> {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Subscriber::Id(id) => Some(*id),
            Subscriber::Email(_) => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Subscriber::Id(_) => None,
            Subscriber::Email(email) => Some(email),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self {
            Subscriber::Id(id) => user.id == *id,
            Subscriber::Email(email) => user.email == *email,
        }
    }
}

impl std::fmt::Display for Subscriber<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Id(id) => write!(f, "id:{id}"),
            Subscriber::Email(email) => write!(f, "email:{email}"),
        }
    }
}

/// Credential store. Every method is one atomic unit against the backing store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<UpdateOutcome>;

    /// Returns `false` when no such user existed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Replaces the subscription of `subscriber`, recording `event_id` in the
    /// same transaction so a redelivered event is a no-op. A trial tier is
    /// refused once `trial_used` is set.
    async fn apply_subscription(
        &self,
        event_id: &str,
        subscriber: Subscriber<'_>,
        subscription: &Subscription,
        now: OffsetDateTime,
    ) -> anyhow::Result<ApplyOutcome>;
}
