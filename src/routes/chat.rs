use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::{MessageDto, MessageFileDto, ReactionDto},
    error::{AppError, AppResult},
    models::{
        Chat, Message, MessageFile, MessageReaction, NewChat, NewMessage, NewMessageFile,
        NewMessageReaction, Profile,
    },
    notify::{self, FanoutEvent},
    schema::{chats, message_files, message_reactions, messages, profiles},
    state::AppState,
};

/// The single well-known conversation every authenticated user belongs to.
pub const ALL_TEAM_CHAT_TYPE: &str = "all";
pub const ALL_TEAM_CHAT_NAME: &str = "All Team";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: Uuid,
    pub content: String,
    pub reply_to: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachFileRequest {
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub storage_path: String,
}

#[derive(Deserialize)]
pub struct ToggleReactionRequest {
    pub reaction: String,
}

/// Lazily created once; the unique constraint on `chat_type` is the guard,
/// not application-level retries.
fn get_or_create_all_chat(conn: &mut PgConnection) -> AppResult<Chat> {
    let new_chat = NewChat {
        id: Uuid::new_v4(),
        chat_type: ALL_TEAM_CHAT_TYPE.to_string(),
        name: ALL_TEAM_CHAT_NAME.to_string(),
    };

    diesel::insert_into(chats::table)
        .values(&new_chat)
        .on_conflict(chats::chat_type)
        .do_nothing()
        .execute(conn)?;

    let chat = chats::table
        .filter(chats::chat_type.eq(ALL_TEAM_CHAT_TYPE))
        .first(conn)?;
    Ok(chat)
}

fn sender_display_name(senders: &HashMap<Uuid, Profile>, sender_id: Uuid) -> String {
    match senders.get(&sender_id) {
        Some(profile) if !profile.name.trim().is_empty() => profile.name.clone(),
        Some(profile) => profile
            .email
            .split('@')
            .next()
            .unwrap_or("Unknown")
            .to_string(),
        None => "Unknown".to_string(),
    }
}

pub async fn get_chat(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;

    let chat = get_or_create_all_chat(&mut conn)?;

    // Most recent N, reversed into ascending order for display.
    let mut rows: Vec<Message> = messages::table
        .filter(messages::chat_id.eq(chat.id))
        .order(messages::created_at.desc())
        .limit(state.config.chat_history_limit)
        .load(&mut conn)?;
    rows.reverse();

    let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();

    let files: Vec<MessageFile> = message_files::table
        .filter(message_files::message_id.eq_any(&ids))
        .order(message_files::uploaded_at.asc())
        .load(&mut conn)?;

    let reactions: Vec<MessageReaction> = message_reactions::table
        .filter(message_reactions::message_id.eq_any(&ids))
        .order(message_reactions::created_at.asc())
        .load(&mut conn)?;

    let sender_ids: Vec<Uuid> = rows.iter().map(|m| m.sender_id).collect();
    let senders: HashMap<Uuid, Profile> = profiles::table
        .filter(profiles::id.eq_any(&sender_ids))
        .load::<Profile>(&mut conn)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    drop(conn);

    let mut files_map: HashMap<Uuid, Vec<MessageFileDto>> = HashMap::new();
    for file in files {
        let dto = presign_file(&state, file).await;
        files_map.entry(dto.message_id).or_default().push(dto);
    }

    let mut reactions_map: HashMap<Uuid, Vec<ReactionDto>> = HashMap::new();
    for reaction in reactions {
        reactions_map
            .entry(reaction.message_id)
            .or_default()
            .push(ReactionDto::from(reaction));
    }

    let message_dtos: Vec<MessageDto> = rows
        .into_iter()
        .map(|row| {
            let sender_name = sender_display_name(&senders, row.sender_id);
            let files = files_map.remove(&row.id).unwrap_or_default();
            let reactions = reactions_map.remove(&row.id).unwrap_or_default();
            MessageDto::from_parts(row, sender_name, files, reactions)
        })
        .collect();

    Ok(Json(json!({
        "chatId": chat.id,
        "messages": message_dtos,
    })))
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<Json<MessageDto>> {
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }

    let mut conn = state.db()?;

    chats::table.find(payload.chat_id).first::<Chat>(&mut conn)?;

    let new_message = NewMessage {
        id: Uuid::new_v4(),
        chat_id: payload.chat_id,
        sender_id: user.user_id,
        content: payload.content.trim().to_string(),
        reply_to: payload.reply_to,
    };

    diesel::insert_into(messages::table)
        .values(&new_message)
        .execute(&mut conn)?;

    let message: Message = messages::table.find(new_message.id).first(&mut conn)?;

    let sender_name = if user.name.trim().is_empty() {
        user.email
            .split('@')
            .next()
            .unwrap_or("Unknown")
            .to_string()
    } else {
        user.name.clone()
    };

    notify::spawn(
        state.clone(),
        FanoutEvent::ChatMessage {
            chat_id: message.chat_id,
            message_id: message.id,
            sender_id: message.sender_id,
            sender_name: sender_name.clone(),
            content: message.content.clone(),
        },
    );

    Ok(Json(MessageDto::from_parts(
        message,
        sender_name,
        vec![],
        vec![],
    )))
}

/// Register an uploaded attachment and hand back the re-fetched parent
/// message, which clients patch into their feed by id.
pub async fn attach_file(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    _user: AuthenticatedUser,
    Json(payload): Json<AttachFileRequest>,
) -> AppResult<Json<MessageDto>> {
    if payload.file_name.trim().is_empty() || payload.storage_path.trim().is_empty() {
        return Err(AppError::bad_request(
            "fileName and storagePath must not be empty",
        ));
    }

    let mut conn = state.db()?;

    messages::table.find(message_id).first::<Message>(&mut conn)?;

    let new_file = NewMessageFile {
        id: Uuid::new_v4(),
        message_id,
        file_name: payload.file_name.trim().to_string(),
        file_size: payload.file_size,
        file_type: payload.file_type,
        storage_path: payload.storage_path.trim().to_string(),
    };

    diesel::insert_into(message_files::table)
        .values(&new_file)
        .execute(&mut conn)?;

    let (message, files, reactions, senders) = load_message_parts(&mut conn, message_id)?;
    drop(conn);

    let sender_name = sender_display_name(&senders, message.sender_id);
    let mut file_dtos = Vec::with_capacity(files.len());
    for file in files {
        file_dtos.push(presign_file(&state, file).await);
    }
    let reaction_dtos = reactions.into_iter().map(ReactionDto::from).collect();

    Ok(Json(MessageDto::from_parts(
        message,
        sender_name,
        file_dtos,
        reaction_dtos,
    )))
}

pub async fn remove_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let file: MessageFile = message_files::table.find(file_id).first(&mut conn)?;
    diesel::delete(message_files::table.find(file_id)).execute(&mut conn)?;
    drop(conn);

    // The row is gone either way; a stranded object only costs storage.
    if let Err(err) = state.storage.delete_object(&file.storage_path).await {
        warn!(path = %file.storage_path, error = %err, "failed to delete attachment object");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Toggle semantics: a user reacting twice with the same emoji ends up
/// where they started. Returns the refreshed full reaction set.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<ToggleReactionRequest>,
) -> AppResult<Json<Vec<ReactionDto>>> {
    if payload.reaction.trim().is_empty() {
        return Err(AppError::bad_request("reaction must not be empty"));
    }
    let reaction = payload.reaction.trim().to_string();

    let mut conn = state.db()?;

    messages::table.find(message_id).first::<Message>(&mut conn)?;

    let existing = message_reactions::table
        .filter(message_reactions::message_id.eq(message_id))
        .filter(message_reactions::user_id.eq(user.user_id))
        .filter(message_reactions::reaction.eq(&reaction))
        .first::<MessageReaction>(&mut conn)
        .optional()?;

    match existing {
        Some(row) => {
            diesel::delete(message_reactions::table.find(row.id)).execute(&mut conn)?;
        }
        None => {
            let new_reaction = NewMessageReaction {
                id: Uuid::new_v4(),
                message_id,
                user_id: user.user_id,
                reaction,
            };
            diesel::insert_into(message_reactions::table)
                .values(&new_reaction)
                .execute(&mut conn)?;
        }
    }

    let rows: Vec<MessageReaction> = message_reactions::table
        .filter(message_reactions::message_id.eq(message_id))
        .order(message_reactions::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(ReactionDto::from).collect()))
}

/// Soft delete, sender-only. Non-senders get not-found rather than a
/// confirmation the message exists.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let message: Message = messages::table.find(message_id).first(&mut conn)?;
    if message.sender_id != user.user_id {
        return Err(AppError::not_found());
    }

    diesel::update(messages::table.find(message_id))
        .set((
            messages::is_deleted.eq(true),
            messages::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn presign_file(state: &AppState, file: MessageFile) -> MessageFileDto {
    let expires_in = Duration::from_secs(state.config.attachment_url_expiry_minutes * 60);
    let mut dto = MessageFileDto::from(file);
    match state
        .storage
        .presign_get_object(&dto.storage_path, expires_in)
        .await
    {
        Ok(url) => dto.download_url = Some(url),
        Err(err) => {
            warn!(path = %dto.storage_path, error = %err, "failed to presign attachment");
        }
    }
    dto
}

type MessageParts = (
    Message,
    Vec<MessageFile>,
    Vec<MessageReaction>,
    HashMap<Uuid, Profile>,
);

fn load_message_parts(conn: &mut PgConnection, message_id: Uuid) -> AppResult<MessageParts> {
    let message: Message = messages::table.find(message_id).first(conn)?;

    let files: Vec<MessageFile> = message_files::table
        .filter(message_files::message_id.eq(message_id))
        .order(message_files::uploaded_at.asc())
        .load(conn)?;

    let reactions: Vec<MessageReaction> = message_reactions::table
        .filter(message_reactions::message_id.eq(message_id))
        .order(message_reactions::created_at.asc())
        .load(conn)?;

    let senders: HashMap<Uuid, Profile> = profiles::table
        .find(message.sender_id)
        .first::<Profile>(conn)
        .optional()?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok((message, files, reactions, senders))
}
