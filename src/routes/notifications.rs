use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::NotificationDto,
    error::{AppError, AppResult},
    models::Notification,
    schema::notifications,
    state::AppState,
};

const LIST_LIMIT: i64 = 50;

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<NotificationDto>>> {
    let mut conn = state.db()?;

    let rows: Vec<Notification> = notifications::table
        .filter(notifications::user_id.eq(user.user_id))
        .order(notifications::created_at.desc())
        .limit(LIST_LIMIT)
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(NotificationDto::from).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let updated = diesel::update(
        notifications::table
            .find(notification_id)
            .filter(notifications::user_id.eq(user.user_id)),
    )
    .set((
        notifications::read.eq(true),
        notifications::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user.user_id))
            .filter(notifications::read.eq(false)),
    )
    .set((
        notifications::read.eq(true),
        notifications::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = diesel::delete(
        notifications::table
            .find(notification_id)
            .filter(notifications::user_id.eq(user.user_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
