use crate::state::AppState;
use axum::Router;

pub mod authenticator;
pub mod claims;
pub mod cookie;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
