use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    dto::{to_iso, TeamMemberDto},
    email::render_invitation_email,
    error::{AppError, AppResult},
    models::{NewTeamMember, NewUserInvitation, Profile, TeamMember, UserInvitation},
    routes::auth::{generate_invite_token, hash_invite_token},
    schema::{profiles, team_members, user_invitations},
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateTeamMemberRequest {
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTeamMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = team_members)]
struct TeamMemberChangeset {
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
}

pub async fn list_members(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<TeamMemberDto>>> {
    let mut conn = state.db()?;

    let rows: Vec<TeamMember> = team_members::table
        .order(team_members::name.asc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(TeamMemberDto::from).collect()))
}

pub async fn create_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTeamMemberRequest>,
) -> AppResult<(StatusCode, Json<TeamMemberDto>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let new_member = NewTeamMember {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        name: payload.name.trim().to_string(),
        email: payload.email.unwrap_or_default().trim().to_lowercase(),
        role: payload.role.unwrap_or_else(|| "Developer".to_string()),
    };

    diesel::insert_into(team_members::table)
        .values(&new_member)
        .execute(&mut conn)?;

    let member: TeamMember = team_members::table.find(new_member.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(TeamMemberDto::from(member))))
}

pub async fn update_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    _user: AuthenticatedUser,
    Json(payload): Json<UpdateTeamMemberRequest>,
) -> AppResult<Json<TeamMemberDto>> {
    let mut conn = state.db()?;

    team_members::table
        .find(member_id)
        .first::<TeamMember>(&mut conn)?;

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

    let changeset = TeamMemberChangeset {
        name,
        email: payload.email.map(|e| e.trim().to_lowercase()),
        role: payload.role,
    };

    if changeset.name.is_none() && changeset.email.is_none() && changeset.role.is_none() {
        let unchanged: TeamMember = team_members::table.find(member_id).first(&mut conn)?;
        return Ok(Json(TeamMemberDto::from(unchanged)));
    }

    diesel::update(team_members::table.find(member_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: TeamMember = team_members::table.find(member_id).first(&mut conn)?;
    Ok(Json(TeamMemberDto::from(updated)))
}

/// Removing a roster entry also drops any pending invitation for the same
/// email, so the invite table stays consistent with the roster.
pub async fn delete_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let member: TeamMember = team_members::table.find(member_id).first(conn)?;

        diesel::delete(team_members::table.find(member_id)).execute(conn)?;

        if !member.email.is_empty() {
            diesel::delete(
                user_invitations::table
                    .filter(user_invitations::email.eq(&member.email))
                    .filter(user_invitations::accepted.eq(false)),
            )
            .execute(conn)?;
        }

        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn invite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<InviteRequest>,
) -> AppResult<Json<Value>> {
    if payload.email.trim().is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::bad_request("email and name are required"));
    }

    let email = payload.email.trim().to_lowercase();
    let name = payload.name.trim().to_string();
    let role = payload.role.unwrap_or_else(|| "member".to_string());

    let mut conn = state.db()?;

    let already_member = team_members::table
        .filter(team_members::email.eq(&email))
        .first::<TeamMember>(&mut conn)
        .optional()?;
    if already_member.is_some() {
        return Err(AppError::bad_request(
            "this person is already a team member",
        ));
    }

    let existing_profile = profiles::table
        .filter(profiles::email.eq(&email))
        .first::<Profile>(&mut conn)
        .optional()?;
    if existing_profile.is_some() {
        return Err(AppError::bad_request("user with this email already exists"));
    }

    let token = generate_invite_token();
    let token_hash = hash_invite_token(&token);
    let now = Utc::now();
    let expires_at = (now + ChronoDuration::days(state.config.invite_expiry_days)).naive_utc();

    // Re-inviting an email refreshes the token and expiry instead of piling
    // up rows.
    let existing_invitation = user_invitations::table
        .filter(user_invitations::email.eq(&email))
        .first::<UserInvitation>(&mut conn)
        .optional()?;

    let invitation: UserInvitation = match existing_invitation {
        Some(existing) => {
            diesel::update(user_invitations::table.find(existing.id))
                .set((
                    user_invitations::name.eq(&name),
                    user_invitations::role.eq(&role),
                    user_invitations::token_hash.eq(&token_hash),
                    user_invitations::expires_at.eq(expires_at),
                    user_invitations::accepted.eq(false),
                    user_invitations::invited_by.eq(user.user_id),
                    user_invitations::updated_at.eq(now.naive_utc()),
                ))
                .execute(&mut conn)?;
            user_invitations::table.find(existing.id).first(&mut conn)?
        }
        None => {
            let new_invitation = NewUserInvitation {
                id: Uuid::new_v4(),
                email: email.clone(),
                name: name.clone(),
                role: role.clone(),
                token_hash: token_hash.clone(),
                expires_at,
                invited_by: user.user_id,
            };
            diesel::insert_into(user_invitations::table)
                .values(&new_invitation)
                .execute(&mut conn)?;
            user_invitations::table
                .find(new_invitation.id)
                .first(&mut conn)?
        }
    };

    drop(conn);

    let inviter_name = if user.name.trim().is_empty() {
        user.email.clone()
    } else {
        user.name.clone()
    };
    let setup_url = format!(
        "{}/auth/setup-password/{token}",
        state.config.site_base_url
    );
    let subject = format!("You've been invited to join {inviter_name}'s team on Dev Tracker");
    let html = render_invitation_email(&name, &inviter_name, &setup_url);

    // The invite is useless without its email, so a delivery failure rolls
    // the row back and surfaces as an error.
    if let Err(err) = state.mailer.send(&email, &subject, &html).await {
        warn!(to = %email, error = %err, "invitation email failed");
        let mut conn = state.db()?;
        let _ = diesel::delete(user_invitations::table.find(invitation.id)).execute(&mut conn);
        return Err(AppError::internal(
            "failed to send invitation email, please try again",
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "invitation sent successfully",
        "invitation": {
            "id": invitation.id,
            "email": invitation.email,
            "name": invitation.name,
            "role": invitation.role,
            "expiresAt": to_iso(invitation.expires_at),
        }
    })))
}
