//! Wire-shaped views of the storage rows.
//!
//! Every entity is mapped snake_case row -> camelCase DTO in exactly one
//! place here, instead of ad hoc at each call site.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{
    Comment, Message, MessageFile, MessageReaction, Notification, Profile, Project, Task,
    TeamMember,
};

pub fn to_iso(ts: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc).to_rfc3339()
}

/// For partial updates: a field that is present-but-null (clear it) must
/// not collapse into a field that was omitted (leave it alone). Use with
/// `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: Uuid,
    pub name: String,
    pub visibility: String,
    pub shared_with: Vec<Uuid>,
    pub billed: bool,
    pub billed_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Project> for ProjectDto {
    fn from(row: Project) -> Self {
        Self {
            id: row.id,
            name: row.name,
            visibility: row.visibility,
            shared_with: row.shared_with,
            billed: row.billed,
            billed_date: row.billed_date.map(|d| d.to_string()),
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: Uuid,
    pub project_id: Uuid,
    pub done: bool,
    pub feature_task: String,
    pub description: String,
    pub assigned_to: String,
    pub priority: String,
    pub status: String,
    pub start_date: Option<String>,
    pub target_date: Option<String>,
    pub notes: String,
    pub visibility: String,
    pub shared_with: Vec<Uuid>,
    pub billed: bool,
    pub billed_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskDto {
    fn from(row: Task) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            done: row.done,
            feature_task: row.feature_task,
            description: row.description,
            assigned_to: row.assigned_to,
            priority: row.priority,
            status: row.status,
            start_date: row.start_date.map(|d| d.to_string()),
            target_date: row.target_date.map(|d| d.to_string()),
            notes: row.notes,
            visibility: row.visibility,
            shared_with: row.shared_with,
            billed: row.billed,
            billed_date: row.billed_date.map(|d| d.to_string()),
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<TeamMember> for TeamMemberDto {
    fn from(row: TeamMember) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

impl From<Comment> for CommentDto {
    fn from(row: Comment) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            author: row.author,
            content: row.content,
            created_at: to_iso(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

impl From<Profile> for ProfileDto {
    fn from(row: Profile) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            created_at: to_iso(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFileDto {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub storage_path: String,
    /// Time-limited signed URL, resolved at read time; absent on writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub uploaded_at: String,
}

impl From<MessageFile> for MessageFileDto {
    fn from(row: MessageFile) -> Self {
        Self {
            id: row.id,
            message_id: row.message_id,
            file_name: row.file_name,
            file_size: row.file_size,
            file_type: row.file_type,
            storage_path: row.storage_path,
            download_url: None,
            uploaded_at: to_iso(row.uploaded_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDto {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub reaction: String,
    pub created_at: String,
}

impl From<MessageReaction> for ReactionDto {
    fn from(row: MessageReaction) -> Self {
        Self {
            id: row.id,
            message_id: row.message_id,
            user_id: row.user_id,
            reaction: row.reaction,
            created_at: to_iso(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub reply_to: Option<Uuid>,
    pub is_deleted: bool,
    pub files: Vec<MessageFileDto>,
    pub reactions: Vec<ReactionDto>,
    pub created_at: String,
    pub updated_at: String,
}

impl MessageDto {
    pub fn from_parts(
        row: Message,
        sender_name: String,
        files: Vec<MessageFileDto>,
        reactions: Vec<ReactionDto>,
    ) -> Self {
        Self {
            id: row.id,
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            sender_name,
            content: row.content,
            reply_to: row.reply_to,
            is_deleted: row.is_deleted,
            files,
            reactions,
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Notification> for NotificationDto {
    fn from(row: Notification) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            link: row.link,
            read: row.read,
            metadata: row.metadata,
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatsDto {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub backlog: usize,
    pub percent_complete: u32,
}
