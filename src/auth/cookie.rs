use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::AppConfig;

pub const SESSION_COOKIE: &str = "session_token";

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(cfg: &AppConfig, token: &str, max_age_secs: u64) -> anyhow::Result<HeaderValue> {
    let value = format!(
        "{SESSION_COOKIE}={token}; Max-Age={max_age_secs}{}",
        attributes(cfg)
    );
    Ok(HeaderValue::from_str(&value)?)
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(cfg: &AppConfig) -> anyhow::Result<HeaderValue> {
    let value = format!("{SESSION_COOKIE}=; Max-Age=0{}", attributes(cfg));
    Ok(HeaderValue::from_str(&value)?)
}

fn attributes(cfg: &AppConfig) -> String {
    let mut attrs = String::from("; Path=/; HttpOnly; SameSite=Lax");
    if !cfg.env.is_development() {
        attrs.push_str("; Secure");
    }
    if let Some(domain) = &cfg.cookie_domain {
        attrs.push_str("; Domain=");
        attrs.push_str(domain);
    }
    attrs
}

/// Reads the session token out of the `Cookie` header(s).
pub fn read_session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}
