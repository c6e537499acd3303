//! Scheduled read-only aggregation jobs.
//!
//! Both jobs iterate every profile, tolerate per-user failures, and keep
//! no sent-marker: re-running a window re-sends. The cron secret on the
//! trigger is the only guard against accidental duplicates.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use tokio::task;
use tracing::{info, warn};

use crate::{
    models::{Profile, Project, Task},
    schema::{comments, profiles, projects, tasks},
    state::AppState,
};

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DailySnapshot {
    pub user_name: String,
    pub user_email: String,
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub overdue_count: usize,
    pub due_today_count: usize,
    pub in_progress_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyActivity {
    pub user_name: String,
    pub user_email: String,
    pub tasks_created: i64,
    pub tasks_completed: i64,
    pub comments_added: i64,
    pub projects_created: i64,
}

impl WeeklyActivity {
    pub fn total(&self) -> i64 {
        self.tasks_created + self.tasks_completed + self.comments_added + self.projects_created
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTotals {
    pub tasks_created: i64,
    pub tasks_completed: i64,
    pub comments_added: i64,
    pub projects_created: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReportRun {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub totals: ActivityTotals,
    /// `None` when the whole send was skipped for lack of activity.
    pub summary: Option<RunSummary>,
}

/// Previous Monday..Sunday relative to `today`.
pub fn previous_week_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days_from_monday = today.weekday().num_days_from_monday() as i64;
    let current_monday = today - Duration::days(days_from_monday);
    let week_start = current_monday - Duration::days(7);
    let week_end = week_start + Duration::days(6);
    (week_start, week_end)
}

fn window_bounds(week_start: NaiveDate, week_end: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        week_start.and_hms_opt(0, 0, 0).expect("valid time"),
        week_end.and_hms_opt(23, 59, 59).expect("valid time"),
    )
}

/// Overdue / due-today / in-progress counts over a user's open tasks.
pub fn snapshot_counts(open_tasks: &[Task], today: NaiveDate) -> (usize, usize, usize) {
    let overdue = open_tasks
        .iter()
        .filter(|t| !t.done && t.target_date.map(|d| d < today).unwrap_or(false))
        .count();
    let due_today = open_tasks
        .iter()
        .filter(|t| !t.done && t.target_date.map(|d| d == today).unwrap_or(false))
        .count();
    let in_progress = open_tasks.iter().filter(|t| t.status == "In Progress").count();
    (overdue, due_today, in_progress)
}

fn display_name(profile: &Profile) -> String {
    if !profile.name.trim().is_empty() {
        profile.name.clone()
    } else {
        profile
            .email
            .split('@')
            .next()
            .unwrap_or("User")
            .to_string()
    }
}

pub async fn run_daily_snapshot(state: &AppState) -> anyhow::Result<RunSummary> {
    info!("starting daily snapshot job");

    let state_clone = state.clone();
    let today = Utc::now().date_naive();
    let (snapshots, mut summary) = task::spawn_blocking(
        move || -> anyhow::Result<(Vec<DailySnapshot>, RunSummary)> {
            let mut conn = state_clone
                .pool
                .get()
                .map_err(|err| anyhow::anyhow!("database pool error: {err}"))?;

            let users: Vec<Profile> = profiles::table
                .order(profiles::created_at.asc())
                .load(&mut conn)?;

            let mut summary = RunSummary::default();
            let mut snapshots = Vec::new();

            for user in users {
                match load_snapshot(&mut conn, &user, today) {
                    Ok(Some(snapshot)) => snapshots.push(snapshot),
                    Ok(None) => summary.skipped += 1,
                    Err(err) => {
                        warn!(user = %user.email, error = %err, "snapshot query failed");
                        summary.failed += 1;
                        summary.errors.push(format!("{}: {err}", user.email));
                    }
                }
            }

            Ok((snapshots, summary))
        },
    )
    .await??;

    for snapshot in &snapshots {
        let subject = format!("Your Daily Task Snapshot - {}", today.format("%b %-d"));
        let html = render_daily_snapshot_email(snapshot);
        match state.mailer.send(&snapshot.user_email, &subject, &html).await {
            Ok(()) => summary.success += 1,
            Err(err) => {
                warn!(to = %snapshot.user_email, error = %err, "daily snapshot send failed");
                summary.failed += 1;
                summary.errors.push(format!("{}: {err}", snapshot.user_email));
            }
        }
    }

    info!(
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        "daily snapshot job completed"
    );
    Ok(summary)
}

fn load_snapshot(
    conn: &mut PgConnection,
    user: &Profile,
    today: NaiveDate,
) -> anyhow::Result<Option<DailySnapshot>> {
    let open_tasks: Vec<Task> = tasks::table
        .filter(tasks::user_id.eq(user.id))
        .filter(tasks::done.eq(false))
        .order(tasks::target_date.asc())
        .load(conn)?;

    if open_tasks.is_empty() {
        return Ok(None);
    }

    let user_projects: Vec<Project> = projects::table
        .filter(projects::user_id.eq(user.id))
        .order(projects::updated_at.desc())
        .load(conn)?;

    let (overdue_count, due_today_count, in_progress_count) = snapshot_counts(&open_tasks, today);

    Ok(Some(DailySnapshot {
        user_name: display_name(user),
        user_email: user.email.clone(),
        tasks: open_tasks,
        projects: user_projects,
        overdue_count,
        due_today_count,
        in_progress_count,
    }))
}

pub async fn run_weekly_report(state: &AppState) -> anyhow::Result<WeeklyReportRun> {
    let today = Utc::now().date_naive();
    let (week_start, week_end) = previous_week_window(today);
    info!(%week_start, %week_end, "starting weekly report job");

    let state_clone = state.clone();
    let (users, activities) = task::spawn_blocking(
        move || -> anyhow::Result<(Vec<Profile>, Vec<WeeklyActivity>)> {
            let mut conn = state_clone
                .pool
                .get()
                .map_err(|err| anyhow::anyhow!("database pool error: {err}"))?;

            let users: Vec<Profile> = profiles::table
                .order(profiles::created_at.asc())
                .load(&mut conn)?;

            let mut activities = Vec::new();
            for user in &users {
                match load_activity(&mut conn, user, week_start, week_end) {
                    Ok(activity) => activities.push(activity),
                    Err(err) => {
                        warn!(user = %user.email, error = %err, "weekly activity query failed");
                    }
                }
            }

            // Most active first.
            activities.sort_by_key(|a| std::cmp::Reverse(a.total()));
            Ok((users, activities))
        },
    )
    .await??;

    let totals = ActivityTotals {
        tasks_created: activities.iter().map(|a| a.tasks_created).sum(),
        tasks_completed: activities.iter().map(|a| a.tasks_completed).sum(),
        comments_added: activities.iter().map(|a| a.comments_added).sum(),
        projects_created: activities.iter().map(|a| a.projects_created).sum(),
    };

    if totals.tasks_created == 0
        && totals.tasks_completed == 0
        && totals.comments_added == 0
        && totals.projects_created == 0
    {
        info!("no activity this week, skipping report");
        return Ok(WeeklyReportRun {
            week_start,
            week_end,
            totals,
            summary: None,
        });
    }

    let html = render_weekly_report_email(&activities, &totals, week_start, week_end);
    let subject = format!(
        "Weekly Team Activity Report - {} to {}",
        week_start.format("%b %-d"),
        week_end.format("%b %-d")
    );

    let mut summary = RunSummary::default();
    for user in &users {
        match state.mailer.send(&user.email, &subject, &html).await {
            Ok(()) => summary.success += 1,
            Err(err) => {
                warn!(to = %user.email, error = %err, "weekly report send failed");
                summary.failed += 1;
                summary.errors.push(format!("{}: {err}", user.email));
            }
        }
    }

    info!(
        success = summary.success,
        failed = summary.failed,
        "weekly report job completed"
    );
    Ok(WeeklyReportRun {
        week_start,
        week_end,
        totals,
        summary: Some(summary),
    })
}

fn load_activity(
    conn: &mut PgConnection,
    user: &Profile,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> anyhow::Result<WeeklyActivity> {
    use diesel::dsl::count_star;

    let (start, end) = window_bounds(week_start, week_end);

    let tasks_created: i64 = tasks::table
        .filter(tasks::user_id.eq(user.id))
        .filter(tasks::created_at.between(start, end))
        .select(count_star())
        .first(conn)?;

    let tasks_completed: i64 = tasks::table
        .filter(tasks::user_id.eq(user.id))
        .filter(tasks::done.eq(true))
        .filter(tasks::updated_at.between(start, end))
        .select(count_star())
        .first(conn)?;

    let comments_added: i64 = comments::table
        .filter(comments::user_id.eq(user.id))
        .filter(comments::created_at.between(start, end))
        .select(count_star())
        .first(conn)?;

    let projects_created: i64 = projects::table
        .filter(projects::user_id.eq(user.id))
        .filter(projects::created_at.between(start, end))
        .select(count_star())
        .first(conn)?;

    Ok(WeeklyActivity {
        user_name: display_name(user),
        user_email: user.email.clone(),
        tasks_created,
        tasks_completed,
        comments_added,
        projects_created,
    })
}

fn render_daily_snapshot_email(snapshot: &DailySnapshot) -> String {
    let mut items = String::new();
    for task in &snapshot.tasks {
        let due = task
            .target_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no target".to_string());
        items.push_str(&format!(
            "<li><strong>{}</strong> [{}] due {}</li>",
            task.feature_task, task.status, due
        ));
    }

    format!(
        "<html><body>\
         <h1>Dev Tracker</h1>\
         <p>Good morning, {}!</p>\
         <p>{} overdue, {} due today, {} in progress across {} projects.</p>\
         <ul>{items}</ul>\
         </body></html>",
        snapshot.user_name,
        snapshot.overdue_count,
        snapshot.due_today_count,
        snapshot.in_progress_count,
        snapshot.projects.len(),
    )
}

fn render_weekly_report_email(
    activities: &[WeeklyActivity],
    totals: &ActivityTotals,
    week_start: NaiveDate,
    week_end: NaiveDate,
) -> String {
    let mut rows = String::new();
    for activity in activities {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            activity.user_name,
            activity.tasks_created,
            activity.tasks_completed,
            activity.comments_added,
            activity.projects_created
        ));
    }

    format!(
        "<html><body>\
         <h1>Dev Tracker</h1>\
         <p>Team activity for {week_start} to {week_end}:</p>\
         <p>{} tasks created, {} completed, {} comments, {} new projects.</p>\
         <table>\
         <tr><th>Member</th><th>Created</th><th>Completed</th><th>Comments</th><th>Projects</th></tr>\
         {rows}\
         </table>\
         </body></html>",
        totals.tasks_created, totals.tasks_completed, totals.comments_added, totals.projects_created,
    )
}
