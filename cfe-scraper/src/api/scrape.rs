//! Scrape run API handlers
//!
//! POST /scrape/start, GET /scrape/status/:run_id, POST /scrape/cancel/:run_id,
//! GET /scrape/runs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Run, RunStatus};
use crate::services::run_job::{self, CANCELLED_MESSAGE};
use crate::AppState;

const DEFAULT_RUNS_LIMIT: i64 = 20;
const MAX_RUNS_LIMIT: i64 = 1000;

fn default_headless() -> bool {
    true
}

/// POST /scrape/start request
#[derive(Debug, Deserialize)]
pub struct StartScrapeRequest {
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Write this run's files here instead of the configured output directory
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// POST /scrape/start and POST /scrape/cancel response
#[derive(Debug, Serialize)]
pub struct RunStateResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

/// GET /scrape/status response
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub elapsed_seconds: Option<u64>,
    /// Failure rows stored for the run; only on the single-run status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<i64>,
}

impl From<Run> for RunStatusResponse {
    fn from(run: Run) -> Self {
        let elapsed_seconds = run.elapsed_seconds();
        Self {
            run_id: run.id,
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            message: run.message,
            elapsed_seconds,
            failures: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

/// POST /scrape/start
///
/// Queue a run and start it in the background. 409 while another run is active.
pub async fn start_scrape(
    State(state): State<AppState>,
    Json(request): Json<StartScrapeRequest>,
) -> ApiResult<Json<RunStateResponse>> {
    let output_dir = request
        .output_dir
        .map(|dir| dir.trim().to_string())
        .filter(|dir| !dir.is_empty());

    // Serializes the active-run check with the insert
    let _guard = state.start_lock.lock().await;

    if db::runs::has_active_run(&state.db).await? {
        return Err(ApiError::Conflict("A scrape run is already active".to_string()));
    }

    let run = Run::new(request.headless, output_dir);
    db::runs::insert_run(&state.db, &run).await?;

    let cancel = state.register_run(run.id).await;

    tracing::info!(
        run_id = %run.id,
        headless = run.headless,
        output_dir = ?run.output_dir,
        "Scrape run queued"
    );

    let response = RunStateResponse {
        run_id: run.id,
        status: run.status,
    };
    run_job::spawn_run(state.clone(), run, cancel);

    Ok(Json(response))
}

/// GET /scrape/status/:run_id
pub async fn get_scrape_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunStatusResponse>> {
    let run = find_run(&state, &run_id).await?;
    let failures = db::failures::count_for_run(&state.db, &run.id.to_string()).await?;

    Ok(Json(RunStatusResponse {
        failures: Some(failures),
        ..RunStatusResponse::from(run)
    }))
}

/// POST /scrape/cancel/:run_id
///
/// A queued run is cancelled at once; a running run stops at the next division
/// boundary and reports `cancelled` when it has wound down.
pub async fn cancel_scrape(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunStateResponse>> {
    let run = find_run(&state, &run_id).await?;
    let run_id = run.id;

    if !run.status.can_transition_to(RunStatus::Cancelled) {
        return Err(ApiError::BadRequest(format!(
            "Run already finished with status {}",
            run.status
        )));
    }

    if let Some(token) = state.cancellation_tokens.read().await.get(&run_id) {
        token.cancel();
    }

    // Only a still-queued row is finalized here; once the job has claimed it,
    // the job records the outcome after it sees the token.
    if run.status == RunStatus::Queued {
        db::runs::cancel_queued(&state.db, run_id, CANCELLED_MESSAGE).await?;
    }

    tracing::info!(run_id = %run_id, "Scrape run cancellation requested");

    let status = db::runs::load_run(&state.db, run_id)
        .await?
        .map(|run| run.status)
        .unwrap_or(RunStatus::Cancelled);

    Ok(Json(RunStateResponse { run_id, status }))
}

/// Any id that is not a stored run, malformed ones included, is a 404
async fn find_run(state: &AppState, run_id: &str) -> ApiResult<Run> {
    let not_found = || ApiError::NotFound("Run not found".to_string());
    let id = Uuid::parse_str(run_id).map_err(|_| not_found())?;
    db::runs::load_run(&state.db, id).await?.ok_or_else(not_found)
}

/// GET /scrape/runs?limit=20
pub async fn list_scrape_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<Vec<RunStatusResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RUNS_LIMIT).clamp(0, MAX_RUNS_LIMIT);
    let runs = db::runs::list_runs(&state.db, limit).await?;

    Ok(Json(runs.into_iter().map(RunStatusResponse::from).collect()))
}

/// Build scrape routes
pub fn scrape_routes() -> Router<AppState> {
    Router::new()
        .route("/scrape/start", post(start_scrape))
        .route("/scrape/status/:run_id", get(get_scrape_status))
        .route("/scrape/cancel/:run_id", post(cancel_scrape))
        .route("/scrape/runs", get(list_scrape_runs))
}
