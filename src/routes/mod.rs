use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod chat;
pub mod comments;
pub mod cron;
pub mod health;
pub mod notifications;
pub mod projects;
pub mod stats;
pub mod tasks;
pub mod team;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route(
            "/setup-password",
            get(auth::validate_invitation).post(auth::setup_password),
        );

    let projects_routes = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        );

    let tasks_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        );

    let comments_routes = Router::new()
        .route(
            "/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/:id", delete(comments::delete_comment));

    let team_routes = Router::new()
        .route("/", get(team::list_members).post(team::create_member))
        .route("/invite", post(team::invite))
        .route(
            "/:id",
            put(team::update_member).delete(team::delete_member),
        );

    let chat_routes = Router::new()
        .route("/", get(chat::get_chat).post(chat::send_message))
        .route("/messages/:id", delete(chat::delete_message))
        .route("/messages/:id/files", post(chat::attach_file))
        .route("/messages/:id/reactions", post(chat::toggle_reaction))
        .route("/files/:id", delete(chat::remove_file));

    let notifications_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/read-all", put(notifications::mark_all_read))
        .route("/:id", delete(notifications::delete_notification))
        .route("/:id/read", put(notifications::mark_read));

    let cron_routes = Router::new()
        .route(
            "/daily-snapshot",
            get(cron::daily_snapshot).post(cron::daily_snapshot),
        )
        .route(
            "/weekly-report",
            get(cron::weekly_report).post(cron::weekly_report),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/projects", projects_routes)
        .nest("/api/tasks", tasks_routes)
        .nest("/api/comments", comments_routes)
        .nest("/api/team", team_routes)
        .nest("/api/chat", chat_routes)
        .nest("/api/notifications", notifications_routes)
        .route("/api/users", get(users::list_users))
        .route("/api/stats", get(stats::all_stats))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/cron", cron_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
