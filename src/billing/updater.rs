use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    billing::plans::tier_for,
    users::{
        model::{Payment, Subscription, SubscriptionStatus},
        store::{ApplyOutcome, Subscriber, UserStore},
    },
};

pub const PAYMENT_METHOD: &str = "Stripe";

/// Fresh subscription for `plan_key` starting at `now`; quota is reset to the limit.
pub fn build_subscription(plan_key: &str, now: OffsetDateTime) -> anyhow::Result<Subscription> {
    let tier = tier_for(plan_key);
    let end_date = tier
        .end_date(now)
        .with_context(|| format!("end date out of range for plan {plan_key:?}"))?;
    Ok(Subscription {
        plan: tier.plan,
        status: SubscriptionStatus::Active,
        message_limit: tier.message_limit,
        remaining_messages: tier.message_limit,
        start_date: now,
        end_date,
        payment: Some(Payment {
            amount: tier.amount_usd,
            method: PAYMENT_METHOD.to_string(),
            last_payment_date: now,
            next_payment_date: end_date,
        }),
    })
}

/// Replaces the subscription of `subscriber` for a verified provider event.
/// A redelivered `event_id` leaves the record untouched.
pub async fn apply_plan_change(
    store: &dyn UserStore,
    event_id: &str,
    subscriber: Subscriber<'_>,
    plan_key: &str,
    now: OffsetDateTime,
) -> anyhow::Result<ApplyOutcome> {
    let subscription = build_subscription(plan_key, now)?;
    let outcome = store
        .apply_subscription(event_id, subscriber, &subscription, now)
        .await?;

    match &outcome {
        ApplyOutcome::Applied(user) => info!(
            %event_id,
            user_id = %user.id,
            plan = subscription.plan.as_str(),
            end_date = %subscription.end_date,
            "subscription updated"
        ),
        ApplyOutcome::Duplicate => info!(%event_id, "duplicate webhook event ignored"),
        ApplyOutcome::UserNotFound => {
            warn!(%event_id, %subscriber, "no user for checkout; subscription not applied")
        }
        ApplyOutcome::TrialAlreadyUsed => {
            warn!(%event_id, %subscriber, "trial already used; subscription not applied")
        }
    }
    Ok(outcome)
}
