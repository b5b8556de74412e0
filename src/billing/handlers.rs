use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    billing::{
        dto::{
            CheckoutBody, CheckoutResponse, CheckoutSessionObject, StripeEvent, WebhookAck,
            CHECKOUT_COMPLETED,
        },
        plans::{catalog_entry, CatalogEntry, CATALOG},
        signature::{self, SIGNATURE_HEADER},
        stripe::{CheckoutError, CheckoutRequest},
        updater,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
    users::{self, store::Subscriber},
};

pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/billing/plans", get(plans))
        .route("/billing/checkout", post(checkout))
        .route("/billing/webhook", post(webhook))
}

pub async fn plans() -> Json<&'static [CatalogEntry]> {
    Json(CATALOG)
}

#[instrument(skip(state, claims, body))]
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(body): AppJson<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let plan = catalog_entry(body.plan_key.trim())
        .filter(|p| p.purchasable())
        .ok_or_else(|| AppError::Validation("Invalid plan key".into()))?;
    let price = plan
        .price_usd
        .ok_or_else(|| AppError::Validation("Invalid plan key".into()))?;

    let user = users::services::load_user(state.store.as_ref(), claims.sub).await?;
    let base = state.config.public_base_url.trim_end_matches('/');
    let req = CheckoutRequest {
        plan,
        user_id: user.id,
        unit_amount_cents: price * 100,
        customer_email: &user.email,
        success_url: format!("{base}/dashboard/account?success=1"),
        cancel_url: format!("{base}/dashboard/account?canceled=1"),
    };

    let session = state
        .checkout
        .create_checkout_session(&req)
        .await
        .map_err(|e| match e {
            CheckoutError::NotConfigured => AppError::Configuration(e.to_string()),
            CheckoutError::Unavailable(msg) => AppError::UpstreamUnavailable(msg),
        })?;

    info!(user_id = %claims.sub, plan = plan.key, session_id = %session.id, "checkout started");
    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Stripe webhook. The raw body is needed for signature verification.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let Some(secret) = state.config.stripe.webhook_secret.as_deref() else {
        error!("STRIPE_WEBHOOK_SECRET is not set; rejecting webhook");
        return Err(AppError::UpstreamSignatureInvalid(
            "webhook secret not configured".into(),
        ));
    };

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let now = OffsetDateTime::now_utc();
    signature::verify(
        &body,
        header,
        secret,
        state.config.stripe.webhook_tolerance_secs,
        now.unix_timestamp(),
    )
    .map_err(|e| {
        warn!(error = %e, "webhook signature verification failed");
        AppError::UpstreamSignatureInvalid(e.to_string())
    })?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed event: {e}")))?;

    if event.kind != CHECKOUT_COMPLETED {
        debug!(event_id = %event.id, kind = %event.kind, "ignoring webhook event");
        return Ok(Json(WebhookAck { received: true }));
    }

    let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
        .map_err(|e| AppError::Validation(format!("malformed checkout session: {e}")))?;
    let (Some(email), Some(plan_key)) = (session.email(), session.plan_key()) else {
        warn!(event_id = %event.id, "checkout session without email or plan key");
        return Err(AppError::Validation("Missing email or plan key".into()));
    };

    let subscriber = match session.user_id() {
        Some(id) => Subscriber::Id(id),
        None => Subscriber::Email(email),
    };
    updater::apply_plan_change(state.store.as_ref(), &event.id, subscriber, plan_key, now).await?;
    Ok(Json(WebhookAck { received: true }))
}
