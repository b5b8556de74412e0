use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subset of a Stripe event envelope that the webhook reads.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// The `data.object` of a completed checkout session.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutSessionObject {
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl CheckoutSessionObject {
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    /// Account id stamped on the session at checkout; survives email changes.
    pub fn user_id(&self) -> Option<Uuid> {
        self.metadata.get("userId")?.trim().parse().ok()
    }

    pub fn plan_key(&self) -> Option<&str> {
        self.metadata
            .get("planKey")
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub plan_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
