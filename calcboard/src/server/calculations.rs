//! `/calculations` routes: owner-scoped BREAD.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use calcboard_core::calculations;
use calcboard_core::{CalculationUpdate, NewCalculation};

use super::auth::CurrentUser;
use super::error::ApiError;
use super::state::{blocking, AppState};

/// POST /calculations
pub(crate) async fn handle_create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<NewCalculation>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let calc = blocking(&state, move |s| {
        calculations::create_calculation(&s.db, &user.id, &request)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(calc)))
}

/// GET /calculations
pub(crate) async fn handle_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let calcs = blocking(&state, move |s| {
        calculations::list_calculations(&s.db, &user.id)
    })
    .await?;
    Ok(Json(calcs))
}

/// GET /calculations/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let calc = blocking(&state, move |s| {
        calculations::get_calculation(&s.db, &user.id, &id)
    })
    .await?;
    Ok(Json(calc))
}

/// PUT /calculations/{id}
pub(crate) async fn handle_update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<CalculationUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(update) = payload?;
    let calc = blocking(&state, move |s| {
        calculations::update_calculation(&s.db, &user.id, &id, &update)
    })
    .await?;
    Ok(Json(calc))
}

/// DELETE /calculations/{id}
pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| {
        calculations::delete_calculation(&s.db, &user.id, &id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
