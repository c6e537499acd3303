use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::ProjectDto,
    error::{AppError, AppResult},
    models::{NewProject, Project},
    policy::{self, Visibility},
    schema::{comments, projects, tasks},
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub visibility: Option<String>,
    pub shared_with: Option<Vec<Uuid>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub visibility: Option<String>,
    pub shared_with: Option<Vec<Uuid>>,
    pub billed: Option<bool>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub billed_date: Option<Option<NaiveDate>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = projects)]
struct ProjectChangeset {
    name: Option<String>,
    visibility: Option<String>,
    shared_with: Option<Vec<Uuid>>,
    billed: Option<bool>,
    billed_date: Option<Option<NaiveDate>>,
    updated_at: chrono::NaiveDateTime,
}

fn parse_visibility(raw: &str) -> AppResult<Visibility> {
    Visibility::parse(raw)
        .ok_or_else(|| AppError::bad_request("visibility must be one of private, specific, all"))
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ProjectDto>>> {
    let mut conn = state.db()?;

    let rows: Vec<Project> = projects::table
        .order(projects::created_at.desc())
        .load(&mut conn)?;

    let visible = rows
        .into_iter()
        .filter(|p| policy::can_access(p, user.user_id))
        .map(ProjectDto::from)
        .collect();

    Ok(Json(visible))
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectDto>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let visibility = match payload.visibility.as_deref() {
        Some(raw) => parse_visibility(raw)?,
        None => Visibility::Private,
    };

    let mut conn = state.db()?;
    let new_project = NewProject {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        name: payload.name.trim().to_string(),
        visibility: visibility.as_str().to_string(),
        shared_with: payload.shared_with.unwrap_or_default(),
    };

    diesel::insert_into(projects::table)
        .values(&new_project)
        .execute(&mut conn)?;

    let project: Project = projects::table.find(new_project.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(ProjectDto::from(project))))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProjectDto>> {
    let mut conn = state.db()?;

    let project: Project = projects::table.find(project_id).first(&mut conn)?;
    if !policy::can_access(&project, user.user_id) {
        return Err(AppError::not_found());
    }

    Ok(Json(ProjectDto::from(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<Json<ProjectDto>> {
    let mut conn = state.db()?;

    let project: Project = projects::table.find(project_id).first(&mut conn)?;
    if !policy::can_mutate_project(&project, user.user_id) {
        return Err(AppError::not_found());
    }

    let name = match payload.name {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let visibility = match payload.visibility.as_deref() {
        Some(raw) => Some(parse_visibility(raw)?.as_str().to_string()),
        None => None,
    };

    let changeset = ProjectChangeset {
        name,
        visibility,
        shared_with: payload.shared_with,
        billed: payload.billed,
        billed_date: payload.billed_date,
        updated_at: Utc::now().naive_utc(),
    };

    diesel::update(projects::table.find(project_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: Project = projects::table.find(project_id).first(&mut conn)?;
    Ok(Json(ProjectDto::from(updated)))
}

/// Deleting a project takes its tasks (and their comments) with it.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let project: Project = projects::table.find(project_id).first(conn)?;
        if !policy::can_mutate_project(&project, user.user_id) {
            return Err(AppError::not_found());
        }

        let task_ids = tasks::table
            .filter(tasks::project_id.eq(project_id))
            .select(tasks::id);
        diesel::delete(comments::table.filter(comments::task_id.eq_any(task_ids)))
            .execute(conn)?;
        diesel::delete(tasks::table.filter(tasks::project_id.eq(project_id))).execute(conn)?;
        diesel::delete(projects::table.find(project_id)).execute(conn)?;

        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
