//! Bearer authentication and the `/auth` routes.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Form, Json};
use calcboard_core::{auth, NewUser, User};
use serde::Deserialize;

use super::error::ApiError;
use super::state::{blocking, AppState};

/// The raw token from `Authorization: Bearer <token>`.
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let (scheme, token) = header.split_once(' ').ok_or(ApiError::Unauthenticated)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(BearerToken(token.to_string()))
    }
}

/// The authenticated caller. Handlers scope every query by this user.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let user = blocking(state, move |s| auth::resolve_caller(&s.db, &token)).await?;
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    /// Username or email
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshRequest {
    refresh_token: String,
}

/// POST /auth/register
pub(crate) async fn handle_register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new_user) = payload?;
    let user = blocking(&state, move |s| auth::register(&s.db, &new_user)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let result = blocking(&state, move |s| {
        auth::login(&s.db, &s.config.auth, &request.username, &request.password)
    })
    .await?;
    Ok(Json(result))
}

/// POST /auth/token (form-encoded login, access token only)
pub(crate) async fn handle_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Form<LoginRequest>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(request) = payload?;
    let result = blocking(&state, move |s| {
        auth::login(&s.db, &s.config.auth, &request.username, &request.password)
    })
    .await?;
    Ok(Json(serde_json::json!({
        "access_token": result.tokens.access_token,
        "token_type": result.tokens.token_type,
    })))
}

/// POST /auth/refresh
pub(crate) async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let tokens = blocking(&state, move |s| {
        auth::refresh(&s.db, &s.config.auth, &request.refresh_token)
    })
    .await?;
    Ok(Json(tokens))
}

/// POST /auth/logout
pub(crate) async fn handle_logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| auth::logout(&s.db, &token)).await?;
    Ok(StatusCode::NO_CONTENT)
}
