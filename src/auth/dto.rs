use serde::{Deserialize, Serialize};

use crate::auth::claims::SessionIdentity;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: SessionIdentity,
    pub session_token: String,
    pub handoff_token: String,
    pub expires_in: u64,
}

/// Agent front-end a handoff token is minted for.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Chat,
    Voice,
}

impl Agent {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" => Some(Agent::Chat),
            "voice" => Some(Agent::Voice),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HandoffQuery {
    pub agent: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffResponse {
    pub agent: Agent,
    pub token: String,
    pub redirect_url: String,
}
