use axum::{
    extract::{FromRef, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        claims::SessionIdentity,
        cookie::{clear_session_cookie, session_cookie},
        dto::{Agent, HandoffQuery, HandoffResponse, LoginRequest, LoginResponse},
        extractors::AuthUser,
        jwt::{HandoffKeys, JwtKeys},
        services,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
    users,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
        .route("/auth/handoff", get(handoff))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_keys = JwtKeys::from_ref(&state);
    let handoff_keys = HandoffKeys::from_ref(&state);

    let issued = services::login(
        state.authenticator.as_ref(),
        &state.config.policy,
        &session_keys,
        &handoff_keys,
        payload.email.trim(),
        &payload.password,
        OffsetDateTime::now_utc(),
    )
    .await?;

    let cookie = session_cookie(&state.config, &issued.session_token, session_keys.ttl_secs())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: issued.identity,
            session_token: issued.session_token,
            handoff_token: issued.handoff_token,
            expires_in: session_keys.ttl_secs(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cookie = clear_session_cookie(&state.config)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

#[instrument(skip_all)]
pub async fn session(AuthUser(claims): AuthUser) -> Json<SessionIdentity> {
    Json(claims.user)
}

#[instrument(skip(state, claims))]
pub async fn handoff(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(q): Query<HandoffQuery>,
) -> Result<Json<HandoffResponse>, AppError> {
    let agent = match q.agent.as_deref() {
        None => Agent::Chat,
        Some(raw) => {
            Agent::parse(raw).ok_or_else(|| AppError::Validation(format!("unknown agent {raw:?}")))?
        }
    };

    let user = users::services::load_user(state.store.as_ref(), claims.sub).await?;
    let keys = HandoffKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;
    let base = match agent {
        Agent::Chat => &state.config.agents.chat,
        Agent::Voice => &state.config.agents.voice,
    };
    // JWTs only contain URL-safe characters.
    let sep = if base.contains('?') { '&' } else { '?' };
    let redirect_url = format!("{base}{sep}token={token}");

    Ok(Json(HandoffResponse {
        agent,
        token,
        redirect_url,
    }))
}
