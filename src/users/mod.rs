use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod pg;
pub mod services;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::users_routes())
}
