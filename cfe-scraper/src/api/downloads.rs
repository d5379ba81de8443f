//! File download handlers
//!
//! Both downloads always read from the configured output directory, never from
//! a per-run override.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::path::Path;

use crate::error::{ApiError, ApiResult};
use crate::services::excel::write_english_workbook;
use crate::services::output_store::{ENGLISH_FILE, EXCEL_FILE};
use crate::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Deserialize)]
pub struct ExcelQuery {
    /// Accepted but ignored; the latest workbook is always served
    pub run_id: Option<String>,
}

/// GET /download/english-excel
///
/// Builds the workbook from the English JSON when it does not exist yet.
pub async fn download_english_excel(
    State(state): State<AppState>,
    Query(query): Query<ExcelQuery>,
) -> ApiResult<Response> {
    tracing::debug!(run_id = ?query.run_id, "Excel download requested");
    let xlsx = state.config.output_dir.join(EXCEL_FILE);

    if !tokio::fs::try_exists(&xlsx).await? {
        let english_json = state.config.output_dir.join(ENGLISH_FILE);
        if !tokio::fs::try_exists(&english_json).await? {
            return Err(ApiError::NotFound("No English data available yet.".to_string()));
        }

        let target = xlsx.clone();
        tokio::task::spawn_blocking(move || write_english_workbook(&english_json, &target))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;
    }

    attachment(&xlsx, XLSX_CONTENT_TYPE, EXCEL_FILE).await
}

/// GET /download/english-json
pub async fn download_english_json(State(state): State<AppState>) -> ApiResult<Response> {
    let path = state.config.output_dir.join(ENGLISH_FILE);

    if !tokio::fs::try_exists(&path).await? {
        return Err(ApiError::NotFound("No English JSON available yet.".to_string()));
    }

    attachment(&path, JSON_CONTENT_TYPE, ENGLISH_FILE).await
}

async fn attachment(path: &Path, content_type: &'static str, filename: &str) -> ApiResult<Response> {
    let bytes = tokio::fs::read(path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/download/english-excel", get(download_english_excel))
        .route("/download/english-json", get(download_english_json))
}
