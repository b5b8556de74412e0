use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::users::{
    model::{PlanType, Subscription, User, UserRow},
    store::{ApplyOutcome, ProfileChanges, Subscriber, UpdateOutcome, UserStore},
};

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, job_title, language,
                   email_verified, trial_used, subscription, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, job_title, language,
                   email_verified, trial_used, subscription, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<UpdateOutcome> {
        let result = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name          = COALESCE($2, name),
                   email         = COALESCE($3, email),
                   job_title     = COALESCE($4, job_title),
                   language      = COALESCE($5, language),
                   password_hash = COALESCE($6, password_hash),
                   updated_at    = $7
             WHERE id = $1
            RETURNING id, email, password_hash, name, job_title, language,
                      email_verified, trial_used, subscription, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.job_title.as_deref())
        .bind(changes.language.as_deref())
        .bind(changes.password_hash.as_deref())
        .bind(now)
        .fetch_optional(&self.db)
        .await;

        match result {
            Ok(Some(row)) => Ok(UpdateOutcome::Updated(row.into())),
            Ok(None) => Ok(UpdateOutcome::NotFound),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(UpdateOutcome::EmailTaken)
            }
            Err(e) => Err(e).context("update user profile"),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn apply_subscription(
        &self,
        event_id: &str,
        subscriber: Subscriber<'_>,
        subscription: &Subscription,
        now: OffsetDateTime,
    ) -> anyhow::Result<ApplyOutcome> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, subscriber, received_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(subscriber.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("record webhook event")?
        .rows_affected();

        if recorded == 0 {
            tx.rollback().await.context("rollback tx")?;
            debug!(%event_id, "webhook event already processed");
            return Ok(ApplyOutcome::Duplicate);
        }

        // Exactly one of $1/$2 is non-null; `col = NULL` never matches.
        let is_trial = subscription.plan == PlanType::Trial;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET subscription = $3,
                   trial_used   = trial_used OR $4,
                   updated_at   = $5
             WHERE (id = $1 OR email = $2)
               AND NOT (trial_used AND $4)
            RETURNING id, email, password_hash, name, job_title, language,
                      email_verified, trial_used, subscription, created_at, updated_at
            "#,
        )
        .bind(subscriber.id())
        .bind(subscriber.email())
        .bind(Json(subscription))
        .bind(is_trial)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .context("update subscription")?;

        if let Some(row) = row {
            tx.commit().await.context("commit tx")?;
            return Ok(ApplyOutcome::Applied(row.into()));
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 OR email = $2)",
        )
        .bind(subscriber.id())
        .bind(subscriber.email())
        .fetch_one(&mut *tx)
        .await
        .context("look up subscriber")?;

        if exists {
            tx.commit().await.context("commit tx")?;
            Ok(ApplyOutcome::TrialAlreadyUsed)
        } else {
            // Not recording the event lets a later redelivery apply once the user exists.
            tx.rollback().await.context("rollback tx")?;
            Ok(ApplyOutcome::UserNotFound)
        }
    }
}

/// Runs against a real Postgres only when `TEST_DATABASE_URL` is set; otherwise each test returns early.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::updater::build_subscription;
    use time::macros::datetime;

    async fn store() -> Option<PgUserStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let db = PgPool::connect(&url).await.unwrap();
        crate::db::migrate(&db).await.unwrap();
        Some(PgUserStore::new(db))
    }

    async fn seed(store: &PgUserStore, trial_used: bool) -> User {
        let email = format!("{}@pg.test", Uuid::new_v4());
        sqlx::query(
            "INSERT INTO users (email, name, email_verified, trial_used) VALUES ($1, 'Pg User', TRUE, $2)",
        )
        .bind(&email)
        .bind(trial_used)
        .execute(&store.db)
        .await
        .unwrap();
        store.find_by_email(&email).await.unwrap().unwrap()
    }

    fn event_id() -> String {
        format!("evt_{}", Uuid::new_v4().simple())
    }

    async fn event_recorded(store: &PgUserStore, event_id: &str) -> bool {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM processed_webhook_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&store.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn partial_update_keeps_untouched_columns() {
        let Some(store) = store().await else { return };
        let user = seed(&store, false).await;
        let now = datetime!(2031-02-03 04:05 UTC);

        let changes = ProfileChanges {
            job_title: Some("Auditor".into()),
            ..Default::default()
        };
        let UpdateOutcome::Updated(updated) = store.update_profile(user.id, &changes, now).await.unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(updated.job_title.as_deref(), Some("Auditor"));
        assert_eq!(updated.name.as_deref(), Some("Pg User"));
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.updated_at, now);

        let missing = store.update_profile(Uuid::new_v4(), &changes, now).await.unwrap();
        assert_eq!(missing, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn taken_email_is_reported_not_raised() {
        let Some(store) = store().await else { return };
        let a = seed(&store, false).await;
        let b = seed(&store, false).await;

        let changes = ProfileChanges {
            email: Some(b.email.clone()),
            ..Default::default()
        };
        let outcome = store
            .update_profile(a.id, &changes, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::EmailTaken);
        assert_eq!(store.find_by_id(a.id).await.unwrap().unwrap().email, a.email);
    }

    #[tokio::test]
    async fn redelivered_event_is_applied_once() {
        let Some(store) = store().await else { return };
        let user = seed(&store, false).await;
        let now = OffsetDateTime::now_utc();
        let sub = build_subscription("monthly", now).unwrap();
        let evt = event_id();

        let first = store
            .apply_subscription(&evt, Subscriber::Id(user.id), &sub, now)
            .await
            .unwrap();
        let ApplyOutcome::Applied(applied) = first else {
            panic!("expected first delivery to apply");
        };
        assert_eq!(applied.subscription.map(|s| s.plan), Some(PlanType::Monthly));

        let yearly = build_subscription("yearly", now).unwrap();
        let again = store
            .apply_subscription(&evt, Subscriber::Email(&user.email), &yearly, now)
            .await
            .unwrap();
        assert_eq!(again, ApplyOutcome::Duplicate);
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.subscription.map(|s| s.plan), Some(PlanType::Monthly));
    }

    #[tokio::test]
    async fn spent_trial_is_recorded_but_not_granted() {
        let Some(store) = store().await else { return };
        let user = seed(&store, true).await;
        let now = OffsetDateTime::now_utc();
        let trial = build_subscription("trial", now).unwrap();
        let evt = event_id();

        let outcome = store
            .apply_subscription(&evt, Subscriber::Email(&user.email), &trial, now)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::TrialAlreadyUsed);
        assert!(event_recorded(&store, &evt).await);
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().subscription.is_none());

        let paid = build_subscription("quarterly", now).unwrap();
        let outcome = store
            .apply_subscription(&event_id(), Subscriber::Id(user.id), &paid, now)
            .await
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn first_trial_marks_trial_used() {
        let Some(store) = store().await else { return };
        let user = seed(&store, false).await;
        let now = OffsetDateTime::now_utc();
        let trial = build_subscription("trial", now).unwrap();

        let ApplyOutcome::Applied(updated) = store
            .apply_subscription(&event_id(), Subscriber::Id(user.id), &trial, now)
            .await
            .unwrap()
        else {
            panic!("expected trial to apply");
        };
        assert!(updated.trial_used);
    }

    #[tokio::test]
    async fn unknown_subscriber_leaves_event_unrecorded() {
        let Some(store) = store().await else { return };
        let now = OffsetDateTime::now_utc();
        let sub = build_subscription("monthly", now).unwrap();
        let evt = event_id();

        let outcome = store
            .apply_subscription(&evt, Subscriber::Email("ghost@pg.test"), &sub, now)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::UserNotFound);
        assert!(!event_recorded(&store, &evt).await);

        let outcome = store
            .apply_subscription(&evt, Subscriber::Id(Uuid::new_v4()), &sub, now)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::UserNotFound);
    }
}
