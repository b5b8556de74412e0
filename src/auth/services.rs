use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        authenticator::{AuthFailure, Authenticator},
        claims::SessionIdentity,
        jwt::{HandoffKeys, JwtKeys},
    },
    config::LoginPolicy,
    error::AppError,
    users::model::{PlanType, SubscriptionStatus, User},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Why the policy gate refused an otherwise valid login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    EmailNotVerified,
    NoActiveSubscription,
}

impl PolicyViolation {
    pub fn message(self) -> &'static str {
        match self {
            PolicyViolation::EmailNotVerified => "email address is not verified",
            PolicyViolation::NoActiveSubscription => "no active subscription",
        }
    }
}

/// True for an active paid plan or a trial, as long as it has not run out.
pub fn has_usable_subscription(user: &User, now: OffsetDateTime) -> bool {
    user.subscription.as_ref().is_some_and(|s| {
        let live = s.status == SubscriptionStatus::Active || s.plan == PlanType::Trial;
        live && s.end_date > now
    })
}

pub fn check_policy(
    user: &User,
    policy: &LoginPolicy,
    now: OffsetDateTime,
) -> Result<(), PolicyViolation> {
    if policy.bypass_gates {
        return Ok(());
    }
    if policy.require_email_verified && !user.email_verified {
        return Err(PolicyViolation::EmailNotVerified);
    }
    if policy.require_active_subscription && !has_usable_subscription(user, now) {
        return Err(PolicyViolation::NoActiveSubscription);
    }
    Ok(())
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub identity: SessionIdentity,
    pub session_token: String,
    pub handoff_token: String,
}

/// Single pass: received → user lookup → password check → policy gate → issued.
/// Every credential failure yields the same error.
pub async fn login(
    authenticator: &dyn Authenticator,
    policy: &LoginPolicy,
    session_keys: &JwtKeys,
    handoff_keys: &HandoffKeys,
    email: &str,
    password: &str,
    now: OffsetDateTime,
) -> Result<IssuedSession, AppError> {
    if email.is_empty() || password.is_empty() {
        debug!("login rejected: empty email or password");
        return Err(AppError::invalid_credentials());
    }

    let user = match authenticator.authenticate(email, password).await {
        Ok(u) => u,
        Err(AuthFailure::InvalidCredentials) => {
            warn!(%email, strategy = authenticator.name(), "login rejected");
            return Err(AppError::invalid_credentials());
        }
        Err(AuthFailure::Unavailable(reason)) => {
            error!(%reason, "authentication backend unavailable");
            return Err(AppError::UpstreamUnavailable(
                "authentication service unavailable".into(),
            ));
        }
        Err(AuthFailure::Internal(e)) => {
            error!(error = %e, "authentication failed");
            return Err(AppError::Internal(e));
        }
    };

    if let Err(violation) = check_policy(&user, policy, now) {
        warn!(user_id = %user.id, ?violation, "login blocked by policy gate");
        return Err(AppError::Forbidden(violation.message().into()));
    }

    let identity = SessionIdentity::from(&user);
    let session_token = session_keys.sign_session_at(&identity, now)?;
    let handoff_token = handoff_keys.sign_at(user.id, &user.email, now)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(IssuedSession {
        identity,
        session_token,
        handoff_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use time::Duration;

    use crate::auth::authenticator::LocalStoreAuthenticator;
    use crate::auth::password::{fast_hashing, hash_password};
    use crate::config::{HandoffConfig, JwtConfig};
    use crate::users::memory::{fixtures, MemoryUserStore};
    use crate::users::model::Subscription;

    const STRICT: LoginPolicy = LoginPolicy {
        require_email_verified: true,
        require_active_subscription: true,
        bypass_gates: false,
    };
    const LENIENT: LoginPolicy = LoginPolicy {
        require_email_verified: false,
        require_active_subscription: false,
        bypass_gates: false,
    };

    fn keys() -> (JwtKeys, HandoffKeys) {
        let session = JwtKeys::from(&JwtConfig {
            secret: "session".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 60,
        });
        let handoff = HandoffKeys::from(&HandoffConfig {
            secret: "handoff".into(),
            ttl_minutes: 60 * 24,
        });
        (session, handoff)
    }

    fn subscription(plan: PlanType, status: SubscriptionStatus, end: OffsetDateTime) -> Subscription {
        Subscription {
            plan,
            status,
            message_limit: 100,
            remaining_messages: 100,
            start_date: end - Duration::days(30),
            end_date: end,
            payment: None,
        }
    }

    async fn setup(email: &str, password: &str) -> (Arc<MemoryUserStore>, User) {
        let store = Arc::new(MemoryUserStore::new());
        let hash = hash_password(password, &fast_hashing()).unwrap();
        let user = fixtures::user(email, Some(hash));
        store.insert(user.clone()).await;
        (store, user)
    }

    /// Counts calls so short-circuiting can be observed.
    struct CountingAuthenticator {
        inner: LocalStoreAuthenticator,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.authenticate(email, password).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn secret1_scenario() {
        let (store, user) = setup("a@x.com", "Secret1").await;
        let auth = CountingAuthenticator {
            inner: LocalStoreAuthenticator::new(store),
            calls: AtomicUsize::new(0),
        };
        let (sk, hk) = keys();
        let now = OffsetDateTime::now_utc();

        let ok = login(&auth, &LENIENT, &sk, &hk, "a@x.com", "Secret1", now)
            .await
            .expect("login succeeds");
        assert_eq!(ok.identity.id, user.id);
        let handoff = hk.verify(&ok.handoff_token).unwrap();
        assert_eq!(handoff.id, user.id);
        assert_eq!(handoff.email, "a@x.com");
        let session = sk.verify(&ok.session_token).unwrap();
        assert_eq!(session.sub, user.id);
        assert_eq!(session.user.email, "a@x.com");

        let err = login(&auth, &LENIENT, &sk, &hk, "a@x.com", "secret1", now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);

        let err = login(&auth, &LENIENT, &sk, &hk, "a@x.com", "", now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2, "empty password must short-circuit");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let (store, _) = setup("a@x.com", "Secret1").await;
        let auth = LocalStoreAuthenticator::new(store);
        let (sk, hk) = keys();
        let now = OffsetDateTime::now_utc();

        let unknown = login(&auth, &LENIENT, &sk, &hk, "nobody@x.com", "Secret1", now)
            .await
            .unwrap_err();
        let wrong = login(&auth, &LENIENT, &sk, &hk, "a@x.com", "Wrong1", now)
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.to_string(), crate::error::INVALID_CREDENTIALS);
    }

    #[test]
    fn policy_gate_checks_verification_and_subscription() {
        let now = OffsetDateTime::now_utc();
        let mut user = fixtures::user("a@x.com", None);
        user.email_verified = false;
        assert_eq!(
            check_policy(&user, &STRICT, now),
            Err(PolicyViolation::EmailNotVerified)
        );

        user.email_verified = true;
        assert_eq!(
            check_policy(&user, &STRICT, now),
            Err(PolicyViolation::NoActiveSubscription)
        );

        user.subscription = Some(subscription(
            PlanType::Monthly,
            SubscriptionStatus::Expired,
            now + Duration::days(3),
        ));
        assert!(check_policy(&user, &STRICT, now).is_err());

        user.subscription = Some(subscription(
            PlanType::Trial,
            SubscriptionStatus::Pending,
            now + Duration::days(3),
        ));
        assert_eq!(check_policy(&user, &STRICT, now), Ok(()));

        user.subscription = Some(subscription(
            PlanType::Monthly,
            SubscriptionStatus::Active,
            now - Duration::days(1),
        ));
        assert!(check_policy(&user, &STRICT, now).is_err());

        let bypass = LoginPolicy {
            bypass_gates: true,
            ..STRICT
        };
        user.email_verified = false;
        assert_eq!(check_policy(&user, &bypass, now), Ok(()));
    }

    #[tokio::test]
    async fn gated_login_is_forbidden_after_password_check() {
        let store = Arc::new(MemoryUserStore::new());
        let hash = hash_password("Secret1", &fast_hashing()).unwrap();
        let mut user = fixtures::user("a@x.com", Some(hash));
        user.email_verified = false;
        store.insert(user).await;
        let auth = LocalStoreAuthenticator::new(store);
        let (sk, hk) = keys();
        let policy = LoginPolicy {
            require_email_verified: true,
            require_active_subscription: false,
            bypass_gates: false,
        };

        let err = login(&auth, &policy, &sk, &hk, "a@x.com", "Secret1", OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
    }
}
