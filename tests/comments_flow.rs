mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, TestApp};
use serde_json::json;

async fn seed_assigned_task(app: &TestApp, token: &str) -> Result<String> {
    let project = app
        .post_json(
            "/api/projects",
            &json!({ "name": "Support", "visibility": "all" }),
            Some(token),
        )
        .await?;
    let project = body_to_json(project.into_body()).await?;
    let project_id = project["id"].as_str().unwrap().to_string();

    let task = app
        .post_json(
            "/api/tasks",
            &json!({
                "projectId": project_id,
                "featureTask": "Answer tickets",
                "assignedTo": "Alice",
            }),
            Some(token),
        )
        .await?;
    let task = body_to_json(task.into_body()).await?;
    Ok(task["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn comment_creation_survives_a_mail_outage() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let alice_id = app
        .insert_profile("Alice", "alice@example.com", "alicepass", "member")
        .await?;
    let token = app.login_token("owner@example.com", "ownerpass").await?;
    let task_id = seed_assigned_task(&app, &token).await?;

    // Force the provider down; the write path must not notice.
    app.mailer().set_failing(true);

    let created = app
        .post_json(
            "/api/comments",
            &json!({
                "taskId": task_id,
                "author": "Owner",
                "content": "can you take a look?",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let comment = body_to_json(created.into_body()).await?;
    assert_eq!(comment["content"], "can you take a look?");

    // The notification row still lands; only the email was lost. (Seeding
    // the assigned task already produced a task_assigned notification.)
    let notifications = app.wait_for_notifications(alice_id, 2).await?;
    let comment_notif = notifications
        .iter()
        .find(|n| n.kind == "comment_added")
        .expect("comment_added notification");
    assert!(comment_notif.title.contains("Answer tickets"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn comment_notifies_assignee_by_email_when_mail_is_up() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let alice_id = app
        .insert_profile("Alice", "alice@example.com", "alicepass", "member")
        .await?;
    let token = app.login_token("owner@example.com", "ownerpass").await?;
    let task_id = seed_assigned_task(&app, &token).await?;

    let created = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "Owner", "content": "ping" }),
            Some(&token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);

    app.wait_for_notifications(alice_id, 2).await?;

    // The detached send may lag the notification row briefly.
    let mut sent = app.mailer().sent().await;
    for _ in 0..20 {
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        sent = app.mailer().sent().await;
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert!(sent[0].subject.contains("Answer tickets"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn assignee_commenting_on_own_task_is_not_notified() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let alice_id = app
        .insert_profile("Alice", "alice@example.com", "alicepass", "member")
        .await?;
    let owner_token = app.login_token("owner@example.com", "ownerpass").await?;
    let alice_token = app.login_token("alice@example.com", "alicepass").await?;
    let task_id = seed_assigned_task(&app, &owner_token).await?;

    let created = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "Alice", "content": "on it" }),
            Some(&alice_token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);

    // Seeding already notified Alice of the assignment; her own comment
    // must not add a comment_added on top.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let notifications = app.notifications_for(alice_id).await?;
    assert!(notifications.iter().all(|n| n.kind != "comment_added"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn listing_and_creation_validate_input() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_profile("Owner", "owner@example.com", "ownerpass", "member")
        .await?;
    let token = app.login_token("owner@example.com", "ownerpass").await?;
    let task_id = seed_assigned_task(&app, &token).await?;

    let missing_filter = app.get("/api/comments", Some(&token)).await?;
    assert_eq!(missing_filter.status(), StatusCode::BAD_REQUEST);

    let blank_content = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "Owner", "content": "  " }),
            Some(&token),
        )
        .await?;
    assert_eq!(blank_content.status(), StatusCode::BAD_REQUEST);

    let blank_author = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "", "content": "hello" }),
            Some(&token),
        )
        .await?;
    assert_eq!(blank_author.status(), StatusCode::BAD_REQUEST);

    let ok = app
        .post_json(
            "/api/comments",
            &json!({ "taskId": task_id, "author": "Owner", "content": "hello" }),
            Some(&token),
        )
        .await?;
    assert_eq!(ok.status(), StatusCode::CREATED);

    let listed = app
        .get(&format!("/api/comments?taskId={task_id}"), Some(&token))
        .await?;
    assert_eq!(listed.status(), StatusCode::OK);
    let listed = body_to_json(listed.into_body()).await?;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    app.cleanup().await?;
    Ok(())
}
