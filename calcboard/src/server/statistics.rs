//! `/api` routes: summary, history and per-operation statistics.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use calcboard_core::analytics;
use serde::Deserialize;

use super::auth::CurrentUser;
use super::error::ApiError;
use super::state::{blocking, AppState};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryParams {
    page: Option<i64>,
    page_size: Option<i64>,
    operation: Option<String>,
}

/// GET /api/statistics
pub(crate) async fn handle_statistics(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = blocking(&state, move |s| analytics::user_summary(&s.db, &user.id)).await?;
    Ok(Json(summary))
}

/// GET /api/history?page&page_size&operation
pub(crate) async fn handle_history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let page = params.page.unwrap_or(DEFAULT_PAGE);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    let history = blocking(&state, move |s| {
        analytics::paginated_history(
            &s.db,
            &user.id,
            page,
            page_size,
            params.operation.as_deref(),
        )
    })
    .await?;
    Ok(Json(history))
}

/// GET /api/statistics/operation/{operation}
pub(crate) async fn handle_operation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(operation): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = blocking(&state, move |s| {
        analytics::operation_summary(&s.db, &user.id, &operation)
    })
    .await?;
    Ok(Json(summary))
}
