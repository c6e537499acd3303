use std::collections::HashMap;

use axum::{extract::State, Json};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::ProjectStatsDto,
    error::AppResult,
    models::{Project, Task},
    policy,
    routes::tasks::STATUS_DONE,
    schema::{projects, tasks},
    state::AppState,
};

/// Per-project task rollups over everything the caller can see.
pub async fn all_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<HashMap<Uuid, ProjectStatsDto>>> {
    let mut conn = state.db()?;

    let visible_projects: Vec<Project> = projects::table
        .load::<Project>(&mut conn)?
        .into_iter()
        .filter(|p| policy::can_access(p, user.user_id))
        .collect();

    let project_ids: Vec<Uuid> = visible_projects.iter().map(|p| p.id).collect();
    let visible_tasks: Vec<Task> = tasks::table
        .filter(tasks::project_id.eq_any(&project_ids))
        .load::<Task>(&mut conn)?
        .into_iter()
        .filter(|t| policy::can_access(t, user.user_id))
        .collect();

    let mut grouped: HashMap<Uuid, Vec<&Task>> = HashMap::new();
    for task in &visible_tasks {
        grouped.entry(task.project_id).or_default().push(task);
    }

    let stats = visible_projects
        .iter()
        .map(|project| {
            let project_tasks = grouped.remove(&project.id).unwrap_or_default();
            (project.id, project_stats(&project_tasks))
        })
        .collect();

    Ok(Json(stats))
}

fn project_stats(project_tasks: &[&Task]) -> ProjectStatsDto {
    let total = project_tasks.len();
    let completed = project_tasks
        .iter()
        .filter(|t| t.done || t.status == STATUS_DONE)
        .count();
    let in_progress = project_tasks
        .iter()
        .filter(|t| t.status == "In Progress")
        .count();
    let backlog = project_tasks
        .iter()
        .filter(|t| t.status == "Backlog")
        .count();
    let percent_complete = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };

    ProjectStatsDto {
        total,
        completed,
        in_progress,
        backlog,
        percent_complete,
    }
}
