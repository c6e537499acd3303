use axum::{extract::State, Json};
use diesel::prelude::*;
use serde_json::{json, Value};

use crate::{
    auth::AuthenticatedUser,
    dto::ProfileDto,
    error::AppResult,
    models::Profile,
    schema::profiles,
    state::AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;

    let rows: Vec<Profile> = profiles::table
        .order(profiles::created_at.asc())
        .load(&mut conn)?;

    let all_profiles: Vec<ProfileDto> = rows.into_iter().map(ProfileDto::from).collect();

    Ok(Json(json!({
        "currentUser": {
            "id": user.user_id,
            "email": user.email,
        },
        "allProfiles": all_profiles,
    })))
}
