use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{CachedRequestOptions, RequestMeta};
use crate::repository::ScenarioFilter;
use crate::AppState;

/// Summary payloads are served stale for up to 5 minutes while refreshing.
const SUMMARY_TTL_SECS: u64 = 60;
const SUMMARY_SWR_SECS: u64 = 300;

// ─── GET /api/scenarios ──────────────────────────────────────────

pub async fn list_scenarios(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Query(filter): Query<ScenarioFilter>,
) -> Result<Response, AppError> {
    let repo = state.scenarios.clone();

    state
        .responses
        .cached_request(
            &meta,
            move || async move {
                let scenarios = repo.list(&filter).await?;
                Ok(json!({
                    "total": scenarios.len(),
                    "scenarios": scenarios,
                }))
            },
            CachedRequestOptions::default(),
        )
        .await
}

// ─── GET /api/scenarios/:id ──────────────────────────────────────

pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> Result<Response, AppError> {
    // The wrapper reports every handler failure as 500, so unknown ids
    // are answered before it runs.
    if !state.scenarios.contains(&id).await? {
        return Err(AppError::NotFound(format!("scenario '{id}' not found")));
    }

    let repo = state.scenarios.clone();
    state
        .responses
        .cached_request(
            &meta,
            move || async move {
                let scenario = repo
                    .find(&id)
                    .await?
                    .ok_or_else(|| AppError::Handler(format!("scenario '{id}' disappeared")))?;
                serde_json::to_value(scenario).map_err(|e| AppError::Internal(e.to_string()))
            },
            CachedRequestOptions::default(),
        )
        .await
}

// ─── GET /api/scenarios/:id/summary ──────────────────────────────

pub async fn scenario_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> Result<Response, AppError> {
    if !state.scenarios.contains(&id).await? {
        return Err(AppError::NotFound(format!("scenario '{id}' not found")));
    }

    let repo = state.scenarios.clone();
    state
        .responses
        .cached_request(
            &meta,
            move || async move {
                let scenario = repo
                    .find(&id)
                    .await?
                    .ok_or_else(|| AppError::Handler(format!("scenario '{id}' disappeared")))?;
                Ok(json!({
                    "id": scenario.id,
                    "title": scenario.title,
                    "difficulty": scenario.difficulty,
                    "taskCount": scenario.tasks.len(),
                    "estimatedMinutes": scenario.estimated_minutes(),
                    "domains": scenario.domains,
                }))
            },
            CachedRequestOptions::default()
                .ttl(SUMMARY_TTL_SECS)
                .stale_while_revalidate(SUMMARY_SWR_SECS),
        )
        .await
}
