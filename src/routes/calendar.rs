//! Calendar sync endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use rel8_core::UpdateType;

use crate::routes::AppError;
use crate::state::AppState;
use crate::store::{OutreachTask, SyncLogEntry};
use crate::sync::{run_calendar_update, CalendarUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/calendar/update", post(calendar_update))
        .route("/outreach/{id}/sync-logs", get(sync_logs))
        .route("/formula", get(formula))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// GET /health - Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Request body for a calendar update
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarUpdateRequest {
    pub outreach_id: String,
    pub update_type: UpdateType,
    pub user_email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarUpdateResponse {
    pub success: bool,
    pub sequence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

/// POST /calendar/update - Send an updated invitation for one outreach task
async fn calendar_update(
    State(state): State<AppState>,
    Json(req): Json<CalendarUpdateRequest>,
) -> Result<Json<CalendarUpdateResponse>, AppError> {
    let outcome = run_calendar_update(
        &state.pool,
        state.mailer.as_ref(),
        &state.config.system_email,
        CalendarUpdate {
            outreach_id: req.outreach_id,
            update_type: req.update_type,
            recipient_email: req.user_email,
        },
    )
    .await?;

    Ok(Json(CalendarUpdateResponse {
        success: true,
        sequence: outcome.sequence,
        email_id: outcome.email_id,
    }))
}

/// GET /outreach/:id/sync-logs - Audit trail for one task, newest first
async fn sync_logs(
    State(state): State<AppState>,
    Path(outreach_id): Path<String>,
) -> Result<Json<Vec<SyncLogEntry>>, AppError> {
    // 404 for unknown tasks rather than an empty list
    OutreachTask::find_by_id(&state.pool, &outreach_id)
        .await?
        .ok_or_else(|| rel8_core::SyncError::TaskNotFound(outreach_id.clone()))?;

    let logs = SyncLogEntry::find_by_outreach_id(&state.pool, &outreach_id).await?;
    Ok(Json(logs))
}

/// GET /formula - Resolved scoring weights, grouped by category
async fn formula(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, BTreeMap<String, f64>>> {
    Json(state.formula.snapshot())
}
