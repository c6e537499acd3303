//! Notification fanout.
//!
//! Fanout runs as a detached task after the primary write has committed.
//! The write path and the notify path are independent failure domains:
//! everything here is logged on failure and nothing propagates back to
//! the request that triggered it.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    email,
    models::{NewNotification, Profile, Project, Task},
    schema::{notifications, profiles, projects, tasks},
    state::AppState,
};

pub const KIND_CHAT_MESSAGE: &str = "chat_message";
pub const KIND_TASK_ASSIGNED: &str = "task_assigned";
pub const KIND_COMMENT_ADDED: &str = "comment_added";

#[derive(Debug)]
pub enum FanoutEvent {
    TaskAssigned {
        task_id: Uuid,
        project_id: Uuid,
        feature_task: String,
        assignee: String,
        previous: Option<String>,
    },
    CommentAdded {
        task_id: Uuid,
        commenter: Uuid,
        author: String,
        content: String,
    },
    ChatMessage {
        chat_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        content: String,
    },
}

/// Fire-and-forget entry point used by the write handlers.
pub fn spawn(state: AppState, event: FanoutEvent) {
    tokio::spawn(async move {
        if let Err(err) = dispatch(&state, event).await {
            warn!(error = %err, "notification fanout failed");
        }
    });
}

async fn dispatch(state: &AppState, event: FanoutEvent) -> anyhow::Result<()> {
    match event {
        FanoutEvent::TaskAssigned {
            task_id,
            project_id,
            feature_task,
            assignee,
            previous,
        } => {
            if let Some(old) = &previous {
                info!(%task_id, old = %old, new = %assignee, "task reassigned");
            }

            let state_clone = state.clone();
            task::spawn_blocking(move || -> anyhow::Result<()> {
                let mut conn = state_clone.db().map_err(into_anyhow)?;

                let Some(profile) = resolve_assignee(&mut conn, &assignee)? else {
                    debug!(%task_id, %assignee, "no profile matches assignee; skipping");
                    return Ok(());
                };

                let project: Project = projects::table.find(project_id).first(&mut conn)?;

                insert_notification(
                    &mut conn,
                    NewNotification {
                        id: Uuid::new_v4(),
                        user_id: profile.id,
                        kind: KIND_TASK_ASSIGNED.to_string(),
                        title: format!("New task assigned: {feature_task}"),
                        message: format!(
                            "You were assigned \"{feature_task}\" in {}",
                            project.name
                        ),
                        link: Some(format!("/projects/{project_id}")),
                        metadata: json!({ "taskId": task_id, "projectId": project_id }),
                    },
                )?;
                Ok(())
            })
            .await??;
        }

        FanoutEvent::CommentAdded {
            task_id,
            commenter,
            author,
            content,
        } => {
            let state_clone = state.clone();
            let author_closure = author.clone();
            let content_closure = content.clone();
            let recipient = task::spawn_blocking(
                move || -> anyhow::Result<Option<(Profile, Task)>> {
                    let mut conn = state_clone.db().map_err(into_anyhow)?;

                    let task: Task = tasks::table.find(task_id).first(&mut conn)?;
                    if task.assigned_to.trim().is_empty() {
                        return Ok(None);
                    }

                    let Some(profile) = resolve_assignee(&mut conn, &task.assigned_to)? else {
                        debug!(%task_id, assignee = %task.assigned_to, "no profile matches assignee; skipping");
                        return Ok(None);
                    };

                    // The assignee does not need to hear about their own comment.
                    if profile.id == commenter {
                        return Ok(None);
                    }

                    insert_notification(
                        &mut conn,
                        NewNotification {
                            id: Uuid::new_v4(),
                            user_id: profile.id,
                            kind: KIND_COMMENT_ADDED.to_string(),
                            title: format!("New comment on: {}", task.feature_task),
                            message: format!("{author_closure}: {}", excerpt(&content_closure, 120)),
                            link: Some(format!("/projects/{}", task.project_id)),
                            metadata: json!({ "taskId": task_id, "projectId": task.project_id }),
                        },
                    )?;
                    Ok(Some((profile, task)))
                },
            )
            .await??;

            // Best-effort email; the notification row above already landed.
            if let Some((profile, task)) = recipient {
                let task_url = format!(
                    "{}/projects/{}",
                    state.config.site_base_url, task.project_id
                );
                let html = email::render_comment_email(
                    &profile.name,
                    &author,
                    &task.feature_task,
                    &content,
                    &task_url,
                );
                let subject = format!("New comment on {}", task.feature_task);
                if let Err(err) = state.mailer.send(&profile.email, &subject, &html).await {
                    warn!(to = %profile.email, error = %err, "comment email failed");
                }
            }
        }

        FanoutEvent::ChatMessage {
            chat_id,
            message_id,
            sender_id,
            sender_name,
            content,
        } => {
            let state_clone = state.clone();
            task::spawn_blocking(move || -> anyhow::Result<()> {
                let mut conn = state_clone.db().map_err(into_anyhow)?;

                let recipients: Vec<Uuid> = profiles::table
                    .filter(profiles::id.ne(sender_id))
                    .select(profiles::id)
                    .load(&mut conn)?;

                let body = excerpt(&content, 120);
                for user_id in recipients {
                    insert_notification(
                        &mut conn,
                        NewNotification {
                            id: Uuid::new_v4(),
                            user_id,
                            kind: KIND_CHAT_MESSAGE.to_string(),
                            title: format!("New message from {sender_name}"),
                            message: body.clone(),
                            link: None,
                            metadata: json!({ "chatId": chat_id, "messageId": message_id }),
                        },
                    )?;
                }
                Ok(())
            })
            .await??;
        }
    }

    Ok(())
}

/// Assignees are stored as display text; resolution is an exact name or
/// email match against profiles. No match means no notification.
fn resolve_assignee(
    conn: &mut PgConnection,
    needle: &str,
) -> Result<Option<Profile>, diesel::result::Error> {
    profiles::table
        .filter(profiles::name.eq(needle).or(profiles::email.eq(needle)))
        .order(profiles::created_at.asc())
        .first::<Profile>(conn)
        .optional()
}

fn insert_notification(
    conn: &mut PgConnection,
    notification: NewNotification,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(notifications::table)
        .values(&notification)
        .execute(conn)?;
    Ok(())
}

fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let mut cut: String = content.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

fn into_anyhow(err: crate::error::AppError) -> anyhow::Error {
    anyhow::anyhow!("{err:?}")
}
