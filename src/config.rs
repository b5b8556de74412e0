use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_development(self) -> bool {
        self == AppEnv::Development
    }
}

/// Which credential check backs `/auth/login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    Local,
    Remote,
    RemoteThenLocal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Signing setup for tokens handed to the agent front-ends.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub webhook_tolerance_secs: i64,
}

/// Extra checks applied after a password matched.
///
/// `bypass_gates` switches every check off; it defaults to on in development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LoginPolicy {
    pub require_email_verified: bool,
    pub require_active_subscription: bool,
    pub bypass_gates: bool,
}

/// Argon2 cost parameters used when hashing new passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentUrls {
    pub chat: String,
    pub voice: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub env: AppEnv,
    pub jwt: JwtConfig,
    pub handoff: HandoffConfig,
    pub stripe: StripeConfig,
    pub policy: LoginPolicy,
    pub hashing: HashingConfig,
    pub auth_strategy: AuthStrategy,
    pub backend_api_url: Option<String>,
    pub upstream_timeout_secs: u64,
    pub cookie_domain: Option<String>,
    pub public_base_url: String,
    pub agents: AgentUrls,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let env = match get("APP_ENV").as_deref() {
            None | Some("production") | Some("prod") => AppEnv::Production,
            Some("development") | Some("dev") => AppEnv::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let jwt_secret = require("JWT_SECRET")?;
        let jwt = JwtConfig {
            secret: jwt_secret.clone(),
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "accountdesk".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "accountdesk-dashboard".into()),
            ttl_minutes: parse_or(&get, "JWT_TTL_MINUTES", 60 * 24)?,
        };
        let handoff = HandoffConfig {
            secret: get("HANDOFF_JWT_SECRET").unwrap_or(jwt_secret),
            ttl_minutes: parse_or(&get, "HANDOFF_TTL_MINUTES", 60 * 24)?,
        };

        let stripe = StripeConfig {
            secret_key: get("STRIPE_SECRET_KEY"),
            webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            api_base: get("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".into()),
            webhook_tolerance_secs: parse_or(&get, "STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
        };

        let policy = LoginPolicy {
            require_email_verified: parse_bool_or(&get, "AUTH_REQUIRE_EMAIL_VERIFIED", true)?,
            require_active_subscription: parse_bool_or(
                &get,
                "AUTH_REQUIRE_ACTIVE_SUBSCRIPTION",
                false,
            )?,
            bypass_gates: parse_bool_or(&get, "AUTH_BYPASS_POLICY_GATES", env.is_development())?,
        };

        let defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: parse_or(&get, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };
        if let Err(e) =
            argon2::Params::new(hashing.memory_kib, hashing.iterations, hashing.parallelism, None)
        {
            let key = match e {
                argon2::Error::MemoryTooLittle | argon2::Error::MemoryTooMuch => {
                    "PASSWORD_HASH_MEMORY_KIB"
                }
                argon2::Error::TimeTooSmall => "PASSWORD_HASH_ITERATIONS",
                argon2::Error::ThreadsTooFew | argon2::Error::ThreadsTooMany => {
                    "PASSWORD_HASH_PARALLELISM"
                }
                _ => "PASSWORD_HASH_*",
            };
            return Err(ConfigError::Invalid {
                key,
                value: format!(
                    "m={} t={} p={}",
                    hashing.memory_kib, hashing.iterations, hashing.parallelism
                ),
            });
        }

        let auth_strategy = match get("AUTH_STRATEGY").as_deref() {
            None | Some("local") => AuthStrategy::Local,
            Some("remote") => AuthStrategy::Remote,
            Some("remote_then_local") => AuthStrategy::RemoteThenLocal,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "AUTH_STRATEGY",
                    value: other.to_string(),
                })
            }
        };
        let backend_api_url = get("BACKEND_API_URL").map(|u| u.trim_end_matches('/').to_string());
        if auth_strategy != AuthStrategy::Local && backend_api_url.is_none() {
            return Err(ConfigError::Missing("BACKEND_API_URL"));
        }

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            env,
            jwt,
            handoff,
            stripe,
            policy,
            hashing,
            auth_strategy,
            backend_api_url,
            upstream_timeout_secs: parse_or(&get, "UPSTREAM_TIMEOUT_SECS", 10)?,
            cookie_domain: get("COOKIE_DOMAIN"),
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:3000".into()),
            agents: AgentUrls {
                chat: get("CHAT_AGENT_URL").unwrap_or_else(|| "https://ask.taxai.ae/".into()),
                voice: get("VOICE_AGENT_URL").unwrap_or_else(|| "https://talk.taxai.ae/".into()),
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(v) => v.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid { key, value: v }),
    }
}
