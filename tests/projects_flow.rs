mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn private_projects_are_owner_only() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    app.insert_profile("Other", "other@example.com", "otherpass", "member")
        .await?;
    let owner_token = app.login_token("owner@example.com", "ownerpass").await?;
    let other_token = app.login_token("other@example.com", "otherpass").await?;

    let created = app
        .post_json(
            "/api/projects",
            &json!({ "name": "Secret Initiative" }),
            Some(&owner_token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let project = body_to_json(created.into_body()).await?;
    assert_eq!(project["visibility"], "private");
    let project_id = project["id"].as_str().unwrap().to_string();

    // The owner sees it in both list and detail.
    let detail = app
        .get(&format!("/api/projects/{project_id}"), Some(&owner_token))
        .await?;
    assert_eq!(detail.status(), StatusCode::OK);

    // Everyone else gets not-found, never forbidden.
    let hidden = app
        .get(&format!("/api/projects/{project_id}"), Some(&other_token))
        .await?;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let listed = app.get("/api/projects", Some(&other_token)).await?;
    let listed = body_to_json(listed.into_body()).await?;
    assert_eq!(listed.as_array().unwrap().len(), 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn specific_visibility_tracks_the_share_list() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let shared_id = app
        .insert_profile("Shared", "shared@example.com", "sharedpass", "member")
        .await?;
    app.insert_profile("Outsider", "outsider@example.com", "outsiderpass", "member")
        .await?;
    let owner_token = app.login_token("owner@example.com", "ownerpass").await?;
    let shared_token = app.login_token("shared@example.com", "sharedpass").await?;
    let outsider_token = app
        .login_token("outsider@example.com", "outsiderpass")
        .await?;

    let created = app
        .post_json(
            "/api/projects",
            &json!({
                "name": "Shared Initiative",
                "visibility": "specific",
                "sharedWith": [shared_id],
            }),
            Some(&owner_token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let project = body_to_json(created.into_body()).await?;
    let project_id = project["id"].as_str().unwrap().to_string();

    let visible = app
        .get(&format!("/api/projects/{project_id}"), Some(&shared_token))
        .await?;
    assert_eq!(visible.status(), StatusCode::OK);

    let hidden = app
        .get(&format!("/api/projects/{project_id}"), Some(&outsider_token))
        .await?;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    // Dropping the user from the share list revokes access on the next read.
    let updated = app
        .put_json(
            &format!("/api/projects/{project_id}"),
            &json!({ "sharedWith": Vec::<Uuid>::new() }),
            Some(&owner_token),
        )
        .await?;
    assert_eq!(updated.status(), StatusCode::OK);

    let revoked = app
        .get(&format!("/api/projects/{project_id}"), Some(&shared_token))
        .await?;
    assert_eq!(revoked.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn all_visibility_admits_any_authenticated_user() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    app.insert_profile("Other", "other@example.com", "otherpass", "member")
        .await?;
    let owner_token = app.login_token("owner@example.com", "ownerpass").await?;
    let other_token = app.login_token("other@example.com", "otherpass").await?;

    let created = app
        .post_json(
            "/api/projects",
            &json!({ "name": "Team Board", "visibility": "all" }),
            Some(&owner_token),
        )
        .await?;
    let project = body_to_json(created.into_body()).await?;
    let project_id = project["id"].as_str().unwrap().to_string();

    let visible = app
        .get(&format!("/api/projects/{project_id}"), Some(&other_token))
        .await?;
    assert_eq!(visible.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn only_the_owner_can_update_or_delete() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    app.insert_profile("Other", "other@example.com", "otherpass", "member")
        .await?;
    let owner_token = app.login_token("owner@example.com", "ownerpass").await?;
    let other_token = app.login_token("other@example.com", "otherpass").await?;

    let created = app
        .post_json(
            "/api/projects",
            &json!({ "name": "Visible Board", "visibility": "all" }),
            Some(&owner_token),
        )
        .await?;
    let project = body_to_json(created.into_body()).await?;
    let project_id = project["id"].as_str().unwrap().to_string();

    // Readable for everyone, but mutation still requires ownership.
    let update = app
        .put_json(
            &format!("/api/projects/{project_id}"),
            &json!({ "name": "Hijacked" }),
            Some(&other_token),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::NOT_FOUND);

    let delete = app
        .delete(&format!("/api/projects/{project_id}"), Some(&other_token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);

    let delete = app
        .delete(&format!("/api/projects/{project_id}"), Some(&owner_token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deleting_a_project_cascades_to_its_tasks() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let token = app.login_token("owner@example.com", "ownerpass").await?;

    let created = app
        .post_json(
            "/api/projects",
            &json!({ "name": "Doomed" }),
            Some(&token),
        )
        .await?;
    let project = body_to_json(created.into_body()).await?;
    let project_id = project["id"].as_str().unwrap().to_string();

    let task = app
        .post_json(
            "/api/tasks",
            &json!({ "projectId": project_id, "featureTask": "Build the thing" }),
            Some(&token),
        )
        .await?;
    assert_eq!(task.status(), StatusCode::CREATED);
    let task = body_to_json(task.into_body()).await?;
    let task_id = task["id"].as_str().unwrap().to_string();

    let comment = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "Owner", "content": "first" }),
            Some(&token),
        )
        .await?;
    assert_eq!(comment.status(), StatusCode::CREATED);

    let deleted = app
        .delete(&format!("/api/projects/{project_id}"), Some(&token))
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let project_uuid: Uuid = project_id.parse()?;
    let orphans = app
        .with_conn(move |conn| {
            use devtracker::schema::tasks::dsl::{project_id as project_col, tasks};
            use diesel::dsl::count_star;
            use diesel::prelude::*;
            let count: i64 = tasks
                .filter(project_col.eq(project_uuid))
                .select(count_star())
                .first(conn)?;
            Ok(count)
        })
        .await?;
    assert_eq!(orphans, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejects_blank_names_and_unknown_visibility() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let token = app.login_token("owner@example.com", "ownerpass").await?;

    let blank = app
        .post_json("/api/projects", &json!({ "name": "   " }), Some(&token))
        .await?;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let bogus = app
        .post_json(
            "/api/projects",
            &json!({ "name": "ok", "visibility": "everyone" }),
            Some(&token),
        )
        .await?;
    assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);

    let unauthenticated = app.get("/api/projects", None).await?;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}
