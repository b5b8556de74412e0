use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password::hash_password, services::is_valid_email},
    billing::plans::SubscriptionSummary,
    config::HashingConfig,
    error::AppError,
    users::{
        dto::{ProfileResponse, UpdateProfileRequest},
        model::User,
        store::{ProfileChanges, UpdateOutcome, UserStore},
    },
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Maps the many spellings the dashboard has used onto one stored value.
pub fn normalize_language(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "english" | "en" | "eng" => "english".into(),
        "arabic" | "ar" | "arab" | "العربية" => "arabic".into(),
        "chinese" | "zh" | "中文" => "chinese".into(),
        _ => lower,
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

/// The stored record behind a session. Session claims are a login-time snapshot;
/// anything sent to a third party must come from here.
pub async fn load_user(store: &dyn UserStore, id: Uuid) -> Result<User, AppError> {
    store
        .find_by_id(id)
        .await
        .context("load user")?
        .ok_or_else(user_not_found)
}

pub async fn get_profile(
    store: &dyn UserStore,
    id: Uuid,
    now: OffsetDateTime,
) -> Result<ProfileResponse, AppError> {
    let user = load_user(store, id).await?;
    let subscription_summary = user
        .subscription
        .as_ref()
        .map(|s| SubscriptionSummary::compute(s, user.created_at, now));
    Ok(ProfileResponse {
        user,
        subscription_summary,
    })
}

/// Validates and applies a partial update. The password is re-hashed before it reaches the store.
pub async fn update_profile(
    store: &dyn UserStore,
    hashing: &HashingConfig,
    id: Uuid,
    req: UpdateProfileRequest,
    now: OffsetDateTime,
) -> Result<ProfileResponse, AppError> {
    let email = non_empty(req.email);
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email address".into()));
        }
    }

    // Passwords are taken verbatim; only an empty one is ignored.
    let password_hash = match req.password.filter(|p| !p.is_empty()) {
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Some(p) => Some(hash_password(&p, hashing)?),
        None => None,
    };

    let changes = ProfileChanges {
        name: non_empty(req.name),
        email,
        job_title: non_empty(req.job_title),
        language: non_empty(req.language).map(|l| normalize_language(&l)),
        password_hash,
    };

    match store
        .update_profile(id, &changes, now)
        .await
        .context("update profile")?
    {
        UpdateOutcome::Updated(user) => {
            info!(
                user_id = %id,
                email_changed = changes.email.is_some(),
                password_changed = changes.password_hash.is_some(),
                "profile updated"
            );
            let subscription_summary = user
                .subscription
                .as_ref()
                .map(|s| SubscriptionSummary::compute(s, user.created_at, now));
            Ok(ProfileResponse {
                user,
                subscription_summary,
            })
        }
        UpdateOutcome::NotFound => Err(user_not_found()),
        UpdateOutcome::EmailTaken => {
            warn!(user_id = %id, "profile update rejected: email already in use");
            Err(AppError::Conflict("Email is already in use".into()))
        }
    }
}

pub async fn delete_account(store: &dyn UserStore, id: Uuid) -> Result<(), AppError> {
    if store.delete(id).await.context("delete account")? {
        info!(user_id = %id, "account deleted");
        Ok(())
    } else {
        Err(user_not_found())
    }
}
