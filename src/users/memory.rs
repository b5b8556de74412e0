use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    model::{PlanType, Subscription, User},
    store::{ApplyOutcome, ProfileChanges, Subscriber, UpdateOutcome, UserStore},
};

#[derive(Default)]
struct MemoryData {
    users: HashMap<Uuid, User>,
    processed_events: HashSet<String>,
}

/// In-memory credential store used by the test suite.
#[derive(Default)]
pub struct MemoryUserStore {
    data: RwLock<MemoryData>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record; registration itself lives outside this service.
    pub async fn insert(&self, user: User) {
        self.data.write().await.users.insert(user.id, user);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<UpdateOutcome> {
        let mut data = self.data.write().await;

        if let Some(email) = &changes.email {
            if data.users.values().any(|u| u.id != id && &u.email == email) {
                return Ok(UpdateOutcome::EmailTaken);
            }
        }

        let Some(user) = data.users.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if let Some(v) = &changes.name {
            user.name = Some(v.clone());
        }
        if let Some(v) = &changes.email {
            user.email = v.clone();
        }
        if let Some(v) = &changes.job_title {
            user.job_title = Some(v.clone());
        }
        if let Some(v) = &changes.language {
            user.language = Some(v.clone());
        }
        if let Some(v) = &changes.password_hash {
            user.password_hash = Some(v.clone());
        }
        user.updated_at = now;
        Ok(UpdateOutcome::Updated(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.data.write().await.users.remove(&id).is_some())
    }

    async fn apply_subscription(
        &self,
        event_id: &str,
        subscriber: Subscriber<'_>,
        subscription: &Subscription,
        now: OffsetDateTime,
    ) -> anyhow::Result<ApplyOutcome> {
        let mut data = self.data.write().await;
        if data.processed_events.contains(event_id) {
            return Ok(ApplyOutcome::Duplicate);
        }

        let Some(user) = data.users.values_mut().find(|u| subscriber.matches(u)) else {
            return Ok(ApplyOutcome::UserNotFound);
        };
        if user.trial_used && subscription.plan == PlanType::Trial {
            data.processed_events.insert(event_id.to_string());
            return Ok(ApplyOutcome::TrialAlreadyUsed);
        }
        user.subscription = Some(subscription.clone());
        user.trial_used |= subscription.plan == PlanType::Trial;
        user.updated_at = now;
        let updated = user.clone();

        data.processed_events.insert(event_id.to_string());
        Ok(ApplyOutcome::Applied(updated))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::users::model::User;

    /// A verified user with no subscription and the given password hash.
    pub fn user(email: &str, password_hash: Option<String>) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            name: Some("Test User".into()),
            job_title: None,
            language: None,
            email_verified: true,
            trial_used: false,
            subscription: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::SubscriptionStatus;
    use time::macros::datetime;

    fn subscription(plan: PlanType) -> Subscription {
        Subscription {
            plan,
            status: SubscriptionStatus::Active,
            message_limit: 30,
            remaining_messages: 30,
            start_date: datetime!(2025-03-01 00:00 UTC),
            end_date: datetime!(2025-03-15 00:00 UTC),
            payment: None,
        }
    }

    #[tokio::test]
    async fn update_rejects_taken_email() {
        let store = MemoryUserStore::new();
        let a = fixtures::user("a@x.com", None);
        let b = fixtures::user("b@x.com", None);
        let a_id = a.id;
        store.insert(a).await;
        store.insert(b).await;

        let changes = ProfileChanges {
            email: Some("b@x.com".into()),
            ..Default::default()
        };
        let outcome = store
            .update_profile(a_id, &changes, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::EmailTaken);
    }

    #[tokio::test]
    async fn apply_is_idempotent_per_event() {
        let store = MemoryUserStore::new();
        store.insert(fixtures::user("a@x.com", None)).await;
        let now = datetime!(2025-03-01 00:00 UTC);

        let first = store
            .apply_subscription(
                "evt_1",
                Subscriber::Email("a@x.com"),
                &subscription(PlanType::Trial),
                now,
            )
            .await
            .unwrap();
        let ApplyOutcome::Applied(user) = first else {
            panic!("expected applied, got {first:?}");
        };
        assert!(user.trial_used);

        let again = store
            .apply_subscription(
                "evt_1",
                Subscriber::Email("a@x.com"),
                &subscription(PlanType::Trial),
                now,
            )
            .await
            .unwrap();
        assert_eq!(again, ApplyOutcome::Duplicate);
    }

    #[tokio::test]
    async fn unknown_email_does_not_consume_event() {
        let store = MemoryUserStore::new();
        let now = datetime!(2025-03-01 00:00 UTC);
        let outcome = store
            .apply_subscription(
                "evt_2",
                Subscriber::Email("ghost@x.com"),
                &subscription(PlanType::Monthly),
                now,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::UserNotFound);

        store.insert(fixtures::user("ghost@x.com", None)).await;
        let outcome = store
            .apply_subscription(
                "evt_2",
                Subscriber::Email("ghost@x.com"),
                &subscription(PlanType::Monthly),
                now,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn spent_trial_is_not_granted_again() {
        let store = MemoryUserStore::new();
        let mut user = fixtures::user("a@x.com", None);
        user.trial_used = true;
        let id = user.id;
        store.insert(user).await;
        let now = datetime!(2025-03-01 00:00 UTC);

        let outcome = store
            .apply_subscription("evt_t", Subscriber::Id(id), &subscription(PlanType::Trial), now)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::TrialAlreadyUsed);
        assert!(store.find_by_id(id).await.unwrap().unwrap().subscription.is_none());

        let again = store
            .apply_subscription("evt_t", Subscriber::Id(id), &subscription(PlanType::Trial), now)
            .await
            .unwrap();
        assert_eq!(again, ApplyOutcome::Duplicate);

        let paid = store
            .apply_subscription("evt_p", Subscriber::Id(id), &subscription(PlanType::Monthly), now)
            .await
            .unwrap();
        assert!(matches!(paid, ApplyOutcome::Applied(_)));
    }
}
