use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::password,
    config::{AppConfig, AuthStrategy},
    users::{
        model::{Subscription, User},
        store::UserStore,
    },
};

#[derive(Debug, Error)]
pub enum AuthFailure {
    /// Unknown user or wrong password; callers must not tell these apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// One way of checking an email/password pair.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthFailure>;

    fn name(&self) -> &'static str;
}

/// Checks credentials against the local credential store.
pub struct LocalStoreAuthenticator {
    store: Arc<dyn UserStore>,
}

impl LocalStoreAuthenticator {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authenticator for LocalStoreAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthFailure> {
        let Some(user) = self.store.find_by_email(email).await? else {
            debug!(%email, "login unknown email");
            return Err(AuthFailure::InvalidCredentials);
        };

        if !password::matches_stored(password, user.password_hash.as_deref()) {
            debug!(%email, user_id = %user.id, "login invalid password");
            return Err(AuthFailure::InvalidCredentials);
        }
        Ok(user)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[derive(Serialize)]
struct RemoteLoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// User document returned by the backend API. Missing profile fields default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteUser {
    id: Uuid,
    email: String,
    name: Option<String>,
    job_title: Option<String>,
    language: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    trial_used: bool,
    subscription: Option<Subscription>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
struct RemoteLoginResponse {
    user: RemoteUser,
}

impl From<RemoteUser> for User {
    fn from(r: RemoteUser) -> Self {
        let now = OffsetDateTime::now_utc();
        let created_at = r.created_at.unwrap_or(now);
        Self {
            id: r.id,
            email: r.email,
            password_hash: None,
            name: r.name,
            job_title: r.job_title,
            language: r.language,
            email_verified: r.email_verified,
            trial_used: r.trial_used,
            subscription: r.subscription,
            created_at,
            updated_at: r.updated_at.unwrap_or(created_at),
        }
    }
}

/// Delegates the credential check to the backend API.
pub struct RemoteApiAuthenticator {
    client: Client,
    base_url: String,
}

impl RemoteApiAuthenticator {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for RemoteApiAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthFailure> {
        let url = format!("{}/api/auth/login", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&RemoteLoginRequest { email, password })
            .send()
            .await
            .map_err(|e| AuthFailure::Unavailable(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                let body: RemoteLoginResponse = res
                    .json()
                    .await
                    .map_err(|e| anyhow::anyhow!("malformed backend login response: {e}"))?;
                Ok(body.user.into())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(AuthFailure::InvalidCredentials)
            }
            s if s.is_server_error() => Err(AuthFailure::Unavailable(format!(
                "backend login returned {s}"
            ))),
            s => Err(AuthFailure::Internal(anyhow::anyhow!(
                "unexpected backend login status {s}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Tries `primary`, falling back to `secondary` only when `primary` is unavailable.
/// A credential rejection from `primary` is final.
pub struct FallbackAuthenticator {
    primary: Arc<dyn Authenticator>,
    secondary: Arc<dyn Authenticator>,
}

impl FallbackAuthenticator {
    pub fn new(primary: Arc<dyn Authenticator>, secondary: Arc<dyn Authenticator>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Authenticator for FallbackAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthFailure> {
        match self.primary.authenticate(email, password).await {
            Err(AuthFailure::Unavailable(reason)) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    %reason,
                    "primary authenticator unavailable; falling back"
                );
                self.secondary.authenticate(email, password).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Builds the authenticator selected by `AUTH_STRATEGY`.
pub fn from_config(
    cfg: &AppConfig,
    store: Arc<dyn UserStore>,
) -> anyhow::Result<Arc<dyn Authenticator>> {
    let local = || Arc::new(LocalStoreAuthenticator::new(store.clone())) as Arc<dyn Authenticator>;
    let remote = || -> anyhow::Result<Arc<dyn Authenticator>> {
        let base = cfg
            .backend_api_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("BACKEND_API_URL is required for remote auth"))?;
        let timeout = Duration::from_secs(cfg.upstream_timeout_secs);
        Ok(Arc::new(RemoteApiAuthenticator::new(base, timeout)?))
    };

    Ok(match cfg.auth_strategy {
        AuthStrategy::Local => local(),
        AuthStrategy::Remote => remote()?,
        AuthStrategy::RemoteThenLocal => Arc::new(FallbackAuthenticator::new(remote()?, local())),
    })
}
