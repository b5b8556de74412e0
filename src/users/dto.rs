use serde::{Deserialize, Serialize};

use crate::{billing::plans::SubscriptionSummary, users::model::User};

/// Partial profile update; absent or empty fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub language: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub subscription_summary: Option<SubscriptionSummary>,
}
