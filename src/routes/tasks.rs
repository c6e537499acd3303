use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::TaskDto,
    error::{AppError, AppResult},
    models::{NewTask, Project, Task},
    notify::{self, FanoutEvent},
    policy::{self, Visibility},
    schema::{comments, projects, tasks},
    state::AppState,
};

pub const STATUS_DONE: &str = "Done";
pub const STATUS_BACKLOG: &str = "Backlog";

const PRIORITIES: [&str; 3] = ["High", "Medium", "Low"];
const STATUSES: [&str; 5] = ["Backlog", "In Progress", "Code Review", "Testing", STATUS_DONE];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub project_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project_id: Uuid,
    pub feature_task: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub visibility: Option<String>,
    pub shared_with: Option<Vec<Uuid>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub done: Option<bool>,
    pub feature_task: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub target_date: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
    pub visibility: Option<String>,
    pub shared_with: Option<Vec<Uuid>>,
    pub billed: Option<bool>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub billed_date: Option<Option<NaiveDate>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
struct TaskChangeset {
    done: Option<bool>,
    feature_task: Option<String>,
    description: Option<String>,
    assigned_to: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    start_date: Option<Option<NaiveDate>>,
    target_date: Option<Option<NaiveDate>>,
    notes: Option<String>,
    visibility: Option<String>,
    shared_with: Option<Vec<Uuid>>,
    billed: Option<bool>,
    billed_date: Option<Option<NaiveDate>>,
    updated_at: chrono::NaiveDateTime,
}

fn validate_priority(raw: &str) -> AppResult<String> {
    if PRIORITIES.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(AppError::bad_request(
            "priority must be one of High, Medium, Low",
        ))
    }
}

fn validate_status(raw: &str) -> AppResult<String> {
    if STATUSES.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(AppError::bad_request(
            "status must be one of Backlog, In Progress, Code Review, Testing, Done",
        ))
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TaskDto>>> {
    let mut conn = state.db()?;

    let rows: Vec<Task> = match query.project_id {
        Some(project_id) => tasks::table
            .filter(tasks::project_id.eq(project_id))
            .order(tasks::created_at.desc())
            .load(&mut conn)?,
        None => tasks::table.order(tasks::created_at.desc()).load(&mut conn)?,
    };

    let visible = rows
        .into_iter()
        .filter(|t| policy::can_access(t, user.user_id))
        .map(TaskDto::from)
        .collect();

    Ok(Json(visible))
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskDto>)> {
    if payload.feature_task.trim().is_empty() {
        return Err(AppError::bad_request("task name must not be empty"));
    }

    let priority = match payload.priority.as_deref() {
        Some(raw) => validate_priority(raw)?,
        None => "Medium".to_string(),
    };
    let status = match payload.status.as_deref() {
        Some(raw) => validate_status(raw)?,
        None => STATUS_BACKLOG.to_string(),
    };
    let visibility = match payload.visibility.as_deref() {
        Some(raw) => Visibility::parse(raw)
            .ok_or_else(|| {
                AppError::bad_request("visibility must be one of private, specific, all")
            })?
            .as_str()
            .to_string(),
        None => Visibility::Private.as_str().to_string(),
    };

    let mut conn = state.db()?;

    // The parent must exist; a dangling projectId reads as not-found.
    projects::table
        .find(payload.project_id)
        .first::<Project>(&mut conn)?;

    let assigned_to = payload
        .assigned_to
        .map(|a| a.trim().to_string())
        .unwrap_or_default();

    let new_task = NewTask {
        id: Uuid::new_v4(),
        project_id: payload.project_id,
        user_id: user.user_id,
        done: status == STATUS_DONE,
        feature_task: payload.feature_task.trim().to_string(),
        description: payload.description.unwrap_or_default(),
        assigned_to: assigned_to.clone(),
        priority,
        status,
        start_date: payload.start_date,
        target_date: payload.target_date,
        notes: payload.notes.unwrap_or_default(),
        visibility,
        shared_with: payload.shared_with.unwrap_or_default(),
    };

    diesel::insert_into(tasks::table)
        .values(&new_task)
        .execute(&mut conn)?;

    let task: Task = tasks::table.find(new_task.id).first(&mut conn)?;

    if !assigned_to.is_empty() {
        notify::spawn(
            state.clone(),
            FanoutEvent::TaskAssigned {
                task_id: task.id,
                project_id: task.project_id,
                feature_task: task.feature_task.clone(),
                assignee: assigned_to,
                previous: None,
            },
        );
    }

    Ok((StatusCode::CREATED, Json(TaskDto::from(task))))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<TaskDto>> {
    let mut conn = state.db()?;

    let task: Task = tasks::table.find(task_id).first(&mut conn)?;
    if !policy::can_access(&task, user.user_id) {
        return Err(AppError::not_found());
    }

    Ok(Json(TaskDto::from(task)))
}

/// Partial merge. `status` drives `done`; an explicit `done` is treated as
/// a status shorthand so the two can never disagree.
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    _user: AuthenticatedUser,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<TaskDto>> {
    let mut conn = state.db()?;

    let existing: Task = tasks::table.find(task_id).first(&mut conn)?;

    let feature_task = match payload.feature_task {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("task name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let priority = match payload.priority.as_deref() {
        Some(raw) => Some(validate_priority(raw)?),
        None => None,
    };

    let mut next_status = match payload.status.as_deref() {
        Some(raw) => Some(validate_status(raw)?),
        None => None,
    };
    let mut next_done = next_status.as_deref().map(|s| s == STATUS_DONE);

    if let Some(done) = payload.done {
        if done {
            next_status = Some(STATUS_DONE.to_string());
        } else {
            let effective = next_status.as_deref().unwrap_or(&existing.status);
            if effective == STATUS_DONE {
                next_status = Some(STATUS_BACKLOG.to_string());
            }
        }
        next_done = Some(done);
    }

    let visibility = match payload.visibility.as_deref() {
        Some(raw) => Some(
            Visibility::parse(raw)
                .ok_or_else(|| {
                    AppError::bad_request("visibility must be one of private, specific, all")
                })?
                .as_str()
                .to_string(),
        ),
        None => None,
    };

    let new_assignee = payload.assigned_to.map(|a| a.trim().to_string());
    let assignment_changed = new_assignee
        .as_deref()
        .map(|a| !a.is_empty() && a != existing.assigned_to)
        .unwrap_or(false);

    let changeset = TaskChangeset {
        done: next_done,
        feature_task,
        description: payload.description,
        assigned_to: new_assignee.clone(),
        priority,
        status: next_status,
        start_date: payload.start_date,
        target_date: payload.target_date,
        notes: payload.notes,
        visibility,
        shared_with: payload.shared_with,
        billed: payload.billed,
        billed_date: payload.billed_date,
        updated_at: Utc::now().naive_utc(),
    };

    diesel::update(tasks::table.find(task_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Task = tasks::table.find(task_id).first(&mut conn)?;

    if assignment_changed {
        notify::spawn(
            state.clone(),
            FanoutEvent::TaskAssigned {
                task_id: updated.id,
                project_id: updated.project_id,
                feature_task: updated.feature_task.clone(),
                assignee: updated.assigned_to.clone(),
                previous: Some(existing.assigned_to),
            },
        );
    }

    Ok(Json(TaskDto::from(updated)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        diesel::delete(comments::table.filter(comments::task_id.eq(task_id))).execute(conn)?;
        let deleted = diesel::delete(tasks::table.find(task_id)).execute(conn)?;
        if deleted == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
