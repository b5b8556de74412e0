use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use uuid::Uuid;

use crate::billing::plans::CatalogEntry;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("payments are not configured")]
    NotConfigured,
    #[error("stripe request failed: {0}")]
    Unavailable(String),
}

/// What checkout needs to know about the purchase.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub plan: &'a CatalogEntry,
    pub user_id: Uuid,
    pub unit_amount_cents: i64,
    pub customer_email: &'a str,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Hosted payment page provider.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, CheckoutError>;
}

/// Stripe Checkout over the REST API.
pub struct StripeCheckout {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeCheckout {
    pub fn new(api_base: &str, secret_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }
}

fn form_fields(req: &CheckoutRequest<'_>) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".into()),
        ("payment_method_types[0]", "card".into()),
        ("line_items[0][quantity]", "1".into()),
        ("line_items[0][price_data][currency]", "usd".into()),
        (
            "line_items[0][price_data][unit_amount]",
            req.unit_amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            req.plan.name.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            req.plan.description.to_string(),
        ),
        ("customer_email", req.customer_email.to_string()),
        ("client_reference_id", req.user_id.to_string()),
        ("metadata[planKey]", req.plan.key.to_string()),
        ("metadata[userId]", req.user_id.to_string()),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
    ]
}

#[async_trait]
impl CheckoutGateway for StripeCheckout {
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let key = self.secret_key.as_deref().ok_or(CheckoutError::NotConfigured)?;
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let res = self
            .client
            .post(&url)
            .bearer_auth(key)
            .form(&form_fields(req))
            .send()
            .await
            .map_err(|e| CheckoutError::Unavailable(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, %body, "stripe rejected checkout session");
            return Err(CheckoutError::Unavailable(format!("stripe returned {status}")));
        }

        let session: CheckoutSession = res
            .json()
            .await
            .map_err(|e| CheckoutError::Unavailable(format!("malformed stripe response: {e}")))?;
        debug!(session_id = %session.id, plan = req.plan.key, "checkout session created");
        Ok(session)
    }
}
