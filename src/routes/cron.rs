use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde_json::{json, Value};

use crate::{
    digest,
    error::{AppError, AppResult},
    state::AppState,
};

/// Cron triggers are gated by a shared secret rather than a user session.
fn check_cron_auth(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    if let Some(secret) = &state.config.cron_secret {
        let expected = format!("Bearer {secret}");
        let provided = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::unauthorized());
        }
    }
    Ok(())
}

pub async fn daily_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    check_cron_auth(&state, &headers)?;

    let summary = digest::run_daily_snapshot(&state)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "message": "daily snapshot emails sent",
        "results": summary,
    })))
}

pub async fn weekly_report(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    check_cron_auth(&state, &headers)?;

    let run = digest::run_weekly_report(&state)
        .await
        .map_err(AppError::from)?;

    let response = match &run.summary {
        None => json!({
            "message": "no activity to report",
            "weekStart": run.week_start,
            "weekEnd": run.week_end,
        }),
        Some(summary) => json!({
            "message": "weekly reports sent",
            "weekStart": run.week_start,
            "weekEnd": run.week_end,
            "stats": run.totals,
            "results": summary,
        }),
    };

    Ok(Json(response))
}
