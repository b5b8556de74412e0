use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Plan tier stored on a subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Quarterly,
    Yearly,
    Trial,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::Quarterly => "quarterly",
            PlanType::Yearly => "yearly",
            PlanType::Trial => "trial",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub amount: i64, // whole USD
    pub method: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_payment_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub next_payment_date: OffsetDateTime,
}

/// Subscription embedded in a user record; has no identity of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "type")]
    pub plan: PlanType,
    pub status: SubscriptionStatus,
    pub message_limit: i32,
    pub remaining_messages: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

/// User record as exposed by the store. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub trial_used: bool,
    pub subscription: Option<Subscription>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub language: Option<String>,
    pub email_verified: bool,
    pub trial_used: bool,
    pub subscription: Option<Json<Subscription>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            name: r.name,
            job_title: r.job_title,
            language: r.language,
            email_verified: r.email_verified,
            trial_used: r.trial_used,
            subscription: r.subscription.map(|Json(s)| s),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
