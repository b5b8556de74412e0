use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        claims::SessionIdentity,
        cookie::{clear_session_cookie, session_cookie},
        extractors::AuthUser,
        jwt::JwtKeys,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
    users::{
        dto::{ProfileResponse, UpdateProfileRequest},
        services,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(me).patch(update_me).delete(delete_me))
}

#[instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile =
        services::get_profile(state.store.as_ref(), claims.sub, OffsetDateTime::now_utc()).await?;
    Ok(Json(profile))
}

/// Applies the update and reissues the session so its identity snapshot matches the record.
#[instrument(skip(state, claims, payload), fields(user_id = %claims.sub))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = services::update_profile(
        state.store.as_ref(),
        &state.config.hashing,
        claims.sub,
        payload,
        OffsetDateTime::now_utc(),
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(&SessionIdentity::from(&profile.user))?;
    let cookie = session_cookie(&state.config, &token, keys.ttl_secs())?;
    Ok(([(header::SET_COOKIE, cookie)], Json(profile)))
}

#[instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    services::delete_account(state.store.as_ref(), claims.sub).await?;
    let cookie = clear_session_cookie(&state.config)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}
