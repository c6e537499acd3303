use axum::{extract::Query, extract::State, Json};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewProfile, Profile, UserInvitation},
    schema::{profiles, user_invitations},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    let profile = match profiles::table
        .filter(profiles::email.eq(payload.email.trim().to_lowercase()))
        .first::<Profile>(&mut conn)
    {
        Ok(profile) => profile,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };

    let valid = password::verify_password(&payload.password, &profile.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.generate_token(&profile).map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

#[derive(Deserialize)]
pub struct ValidateInvitationQuery {
    pub token: Option<String>,
}

pub async fn validate_invitation(
    State(state): State<AppState>,
    Query(query): Query<ValidateInvitationQuery>,
) -> AppResult<Json<Value>> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("token is required"))?;

    let mut conn = state.db()?;
    let invitation = find_invitation(&mut conn, token)?;

    if invitation.accepted {
        return Err(AppError::bad_request(
            "this invitation has already been accepted",
        ));
    }

    if invitation.expires_at < Utc::now().naive_utc() {
        return Err(AppError::bad_request("this invitation has expired"));
    }

    Ok(Json(json!({
        "valid": true,
        "invitation": {
            "email": invitation.email,
            "name": invitation.name,
            "role": invitation.role,
            "expiresAt": crate::dto::to_iso(invitation.expires_at),
        }
    })))
}

#[derive(Deserialize)]
pub struct SetupPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Consume an invitation exactly once: create the profile and flip
/// `accepted` in the same transaction, then hand back a signed-in session.
pub async fn setup_password(
    State(state): State<AppState>,
    Json(payload): Json<SetupPasswordRequest>,
) -> AppResult<Json<Value>> {
    if payload.token.is_empty() {
        return Err(AppError::bad_request("token and password are required"));
    }
    if payload.password.len() < password::MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(
            "password must be at least 8 characters long",
        ));
    }

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let invitation = find_invitation(&mut conn, &payload.token)?;
    if invitation.accepted {
        return Err(AppError::new(
            axum::http::StatusCode::NOT_FOUND,
            "invalid or expired invitation token",
        ));
    }
    if invitation.expires_at < now {
        return Err(AppError::bad_request("this invitation has expired"));
    }

    let existing = profiles::table
        .filter(profiles::email.eq(&invitation.email))
        .first::<Profile>(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::bad_request("user with this email already exists"));
    }

    let password_hash = password::hash_password(&payload.password).map_err(AppError::from)?;
    let new_profile = NewProfile {
        id: Uuid::new_v4(),
        email: invitation.email.clone(),
        name: invitation.name.clone(),
        role: invitation.role.clone(),
        password_hash,
    };

    conn.transaction::<(), AppError, _>(|conn| {
        diesel::insert_into(profiles::table)
            .values(&new_profile)
            .execute(conn)?;

        diesel::update(user_invitations::table.find(invitation.id))
            .set((
                user_invitations::accepted.eq(true),
                user_invitations::updated_at.eq(now),
            ))
            .execute(conn)?;

        Ok(())
    })?;

    let profile: Profile = profiles::table.find(new_profile.id).first(&mut conn)?;
    let access_token = state.jwt.generate_token(&profile).map_err(AppError::from)?;

    Ok(Json(json!({
        "success": true,
        "message": "account created successfully",
        "user": {
            "id": profile.id,
            "email": profile.email,
            "name": profile.name,
        },
        "accessToken": access_token,
        "tokenType": "Bearer",
        "expiresIn": state.config.jwt_expiry_minutes * 60,
    })))
}

fn find_invitation(conn: &mut PgConnection, token: &str) -> AppResult<UserInvitation> {
    let hashed = hash_invite_token(token);
    match user_invitations::table
        .filter(user_invitations::token_hash.eq(&hashed))
        .first::<UserInvitation>(conn)
    {
        Ok(invitation) => Ok(invitation),
        Err(diesel::result::Error::NotFound) => Err(AppError::new(
            axum::http::StatusCode::NOT_FOUND,
            "invalid invitation token",
        )),
        Err(err) => Err(AppError::from(err)),
    }
}

/// Only the SHA-256 of an invitation token is stored; the raw token lives
/// in the emailed link alone.
pub fn hash_invite_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
