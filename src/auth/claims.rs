use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::model::{Subscription, User};

/// Snapshot of the user taken when a session is issued.
///
/// Optional fields are always present on locally issued sessions; a remote
/// authentication backend may leave them out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_used: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<&User> for SessionIdentity {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            job_title: u.job_title.clone(),
            language: u.language.clone(),
            trial_used: Some(u.trial_used),
            subscription: u.subscription.clone(),
            created_at: Some(u.created_at),
            updated_at: Some(u.updated_at),
        }
    }
}

/// Dashboard session JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub ver: u8,      // claims schema version
    pub sub: Uuid,    // user ID
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
    pub iss: String,  // issuer
    pub aud: String,  // audience
    pub user: SessionIdentity,
}

impl SessionClaims {
    pub const VERSION: u8 = 1;
}

/// Handoff JWT payload for the agent front-ends: exactly id and email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandoffClaims {
    pub id: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}
