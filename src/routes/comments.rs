use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::CommentDto,
    error::{AppError, AppResult},
    models::{Comment, NewComment, Task},
    notify::{self, FanoutEvent},
    schema::{comments, tasks},
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    pub task_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub task_id: Uuid,
    pub author: String,
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<CommentDto>>> {
    let task_id = query
        .task_id
        .ok_or_else(|| AppError::bad_request("taskId is required"))?;

    let mut conn = state.db()?;
    let rows: Vec<Comment> = comments::table
        .filter(comments::task_id.eq(task_id))
        .order(comments::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(CommentDto::from).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentDto>)> {
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }
    if payload.author.trim().is_empty() {
        return Err(AppError::bad_request("author must not be empty"));
    }

    let mut conn = state.db()?;

    // NotFound here means a dangling taskId, surfaced before any write.
    tasks::table.find(payload.task_id).first::<Task>(&mut conn)?;

    let new_comment = NewComment {
        id: Uuid::new_v4(),
        task_id: payload.task_id,
        user_id: user.user_id,
        author: payload.author.trim().to_string(),
        content: payload.content.trim().to_string(),
    };

    diesel::insert_into(comments::table)
        .values(&new_comment)
        .execute(&mut conn)?;

    let comment: Comment = comments::table.find(new_comment.id).first(&mut conn)?;

    notify::spawn(
        state.clone(),
        FanoutEvent::CommentAdded {
            task_id: comment.task_id,
            commenter: user.user_id,
            author: comment.author.clone(),
            content: comment.content.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = diesel::delete(comments::table.find(comment_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
