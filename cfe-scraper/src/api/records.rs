//! Stored record listings
//!
//! GET /records, GET /failures

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::failures::{self, StoredFailure};
use crate::db::tariffs::{self, clamp_limit, RecordFilter, StoredTariff};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FailuresQuery {
    pub limit: Option<i64>,
}

/// GET /records?limit=100&region=&municipality=&division=&fare=
///
/// Newest first; every given filter must match exactly.
pub async fn list_records(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Json<Vec<StoredTariff>>> {
    let rows = tariffs::list_records(&state.db, &filter).await?;
    Ok(Json(rows))
}

/// GET /failures?limit=100
pub async fn list_failures(
    State(state): State<AppState>,
    Query(query): Query<FailuresQuery>,
) -> ApiResult<Json<Vec<StoredFailure>>> {
    let rows = failures::list_failures(&state.db, clamp_limit(query.limit)).await?;
    Ok(Json(rows))
}

/// Build listing routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records", get(list_records))
        .route("/failures", get(list_failures))
}
