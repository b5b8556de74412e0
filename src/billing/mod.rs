use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod plans;
pub mod signature;
pub mod stripe;
pub mod updater;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::billing_routes())
}
