use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

use crate::users::model::{PlanType, Subscription, SubscriptionStatus};

/// Length of one billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDuration {
    Months(u32),
    Days(i64),
}

/// Quota, validity and price applied when a plan is bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTier {
    pub plan: PlanType,
    pub message_limit: i32,
    pub duration: PlanDuration,
    pub amount_usd: i64,
}

pub const TRIAL_DAYS: i64 = 14;

const MONTHLY: PlanTier = PlanTier {
    plan: PlanType::Monthly,
    message_limit: 100,
    duration: PlanDuration::Months(1),
    amount_usd: 99,
};
const QUARTERLY: PlanTier = PlanTier {
    plan: PlanType::Quarterly,
    message_limit: 300,
    duration: PlanDuration::Months(3),
    amount_usd: 250,
};
const YEARLY: PlanTier = PlanTier {
    plan: PlanType::Yearly,
    message_limit: 1200,
    duration: PlanDuration::Months(12),
    amount_usd: 899,
};
const TRIAL: PlanTier = PlanTier {
    plan: PlanType::Trial,
    message_limit: 30,
    duration: PlanDuration::Days(TRIAL_DAYS),
    amount_usd: 0,
};

/// Resolves a plan key; anything unrecognised gets the trial tier.
pub fn tier_for(key: &str) -> PlanTier {
    match key {
        "monthly" => MONTHLY,
        "quarterly" => QUARTERLY,
        "yearly" => YEARLY,
        _ => TRIAL,
    }
}

impl PlanTier {
    /// End of a period starting at `start`.
    pub fn end_date(&self, start: OffsetDateTime) -> Option<OffsetDateTime> {
        match self.duration {
            PlanDuration::Months(n) => add_months(start, n),
            PlanDuration::Days(n) => start.checked_add(Duration::days(n)),
        }
    }
}

/// Calendar-month addition; the day clamps to the end of the target month.
pub fn add_months(dt: OffsetDateTime, months: u32) -> Option<OffsetDateTime> {
    let date = dt.date();
    let zero_based = i64::from(date.month() as u8 - 1) + i64::from(months);
    let year = date.year() + i32::try_from(zero_based / 12).ok()?;
    let month = time::Month::January.nth_next((zero_based % 12) as u8);
    let day = date.day().min(time::util::days_in_year_month(year, month));
    let target = Date::from_calendar_date(year, month, day).ok()?;
    Some(dt.replace_date(target))
}

/// One entry of the public plan catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub price_usd: Option<i64>,
    pub description: &'static str,
    pub message_limit: Option<i32>,
    pub features: &'static [&'static str],
    pub most_popular: bool,
    pub contact: bool,
}

impl CatalogEntry {
    /// Paid, self-serve plans can go through checkout.
    pub fn purchasable(&self) -> bool {
        !self.contact && self.price_usd.is_some_and(|p| p > 0)
    }
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "trial",
        name: "Free Trial",
        price_usd: Some(0),
        description: "Try all features for 14 days",
        message_limit: Some(TRIAL.message_limit),
        features: &[
            "1 user",
            "Up to 30 messages",
            "Coverage of UAE VAT, Corporate Tax, and Excise regulations",
            "Answers in both English and Arabic",
            "Standard support",
            "No credit card required",
        ],
        most_popular: false,
        contact: false,
    },
    CatalogEntry {
        key: "monthly",
        name: "Monthly Plan",
        price_usd: Some(MONTHLY.amount_usd),
        description: "Ideal for business owners, freelancers, tax advisors, accountants, and finance professionals who need accurate and accessible tax guidance.",
        message_limit: Some(MONTHLY.message_limit),
        features: &[
            "1 user",
            "100 AI-powered messages per month",
            "Coverage of UAE VAT, Corporate Tax, and Excise regulations",
            "Answers in both English and Arabic",
            "Standard support",
            "Access to step-by-step guidance and process explanations",
        ],
        most_popular: false,
        contact: false,
    },
    CatalogEntry {
        key: "quarterly",
        name: "Quarterly Plan",
        price_usd: Some(QUARTERLY.amount_usd),
        description: "Best for professionals who want consistent tax advisory access with savings.",
        message_limit: Some(QUARTERLY.message_limit),
        features: &[
            "1 user",
            "300 messages total over 3 months",
            "All Monthly features",
            "Priority email support",
            "Access to monthly tax regulation digest",
        ],
        most_popular: true,
        contact: false,
    },
    CatalogEntry {
        key: "yearly",
        name: "Yearly Plan",
        price_usd: Some(YEARLY.amount_usd),
        description: "For users committed to long-term support and deeper features, with the best value.",
        message_limit: Some(YEARLY.message_limit),
        features: &[
            "1 to 2 users",
            "1,200 messages per year (averaging 100/month)",
            "All Quarterly features",
            "Early access to new features",
            "Onboarding session included",
        ],
        most_popular: false,
        contact: false,
    },
    CatalogEntry {
        key: "enterprise",
        name: "Enterprise Plan",
        price_usd: None,
        description: "For tax advisors, legal firms, or corporate finance departments managing multiple clients or entities.",
        message_limit: None,
        features: &[
            "AI-powered tax automation",
            "Insights dashboard with ERP-integrated",
            "Custom-built advisory modules",
            "Private AI assistant for your team",
            "Dedicated account manager & SLA support",
            "Flexible usage & multi-user access",
        ],
        most_popular: false,
        contact: true,
    },
];

pub fn catalog_entry(key: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|p| p.key == key)
}

/// Read-time view of a subscription for the account page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub effective_status: SubscriptionStatus,
    pub days_remaining: i64,
    pub trial_ends_in_days: Option<i64>,
    pub used_messages: i32,
}

fn whole_days_until(end: OffsetDateTime, now: OffsetDateTime) -> i64 {
    const DAY: i64 = 24 * 60 * 60;
    let secs = (end - now).whole_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + DAY - 1) / DAY
    }
}

impl SubscriptionSummary {
    pub fn compute(sub: &Subscription, created_at: OffsetDateTime, now: OffsetDateTime) -> Self {
        let effective_status = if sub.end_date <= now {
            SubscriptionStatus::Expired
        } else {
            sub.status
        };
        let trial_ends_in_days = (sub.plan == PlanType::Trial)
            .then(|| whole_days_until(created_at + Duration::days(TRIAL_DAYS), now));
        Self {
            effective_status,
            days_remaining: whole_days_until(sub.end_date, now),
            trial_ends_in_days,
            used_messages: (sub.message_limit - sub.remaining_messages).max(0),
        }
    }
}
