use super::handlers::{admin, confirm, open, sse};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let any = || {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_origin(Any)
            .allow_headers(Any)
    };
    if allowed_origins == "*" {
        return any();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS config is invalid or empty, falling back to allow ANY.");
        any()
    } else {
        tracing::info!("CORS enabled for origins: {:?}", origins);
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_origin(origins)
            .allow_headers(Any)
    }
}

pub fn build_router(state: AppState, allowed_origins: &str) -> Router {
    let open = Router::new()
        .route(
            "/comments",
            get(open::list_comments).post(open::post_comment),
        )
        .route("/confirm_email", get(confirm::confirm_email))
        .route(
            "/confirm_reply_notification",
            get(confirm::confirm_reply_notification),
        )
        .route(
            "/approve",
            get(confirm::approve_get).post(confirm::approve_post),
        );

    let admin = Router::new()
        .route("/projects", post(admin::upsert_project))
        .route("/projects/:project_id/comments", get(admin::list_comments))
        .route(
            "/projects/:project_id/comments/deleted",
            get(admin::deleted_comments),
        )
        .route(
            "/projects/:project_id/commenters",
            get(admin::list_commenters),
        )
        .route(
            "/projects/:project_id/commenters/delete",
            post(admin::delete_by_emails),
        )
        .route("/comments/approve", post(admin::approve))
        .route("/comments/unapprove", post(admin::unapprove))
        .route("/comments/delete", post(admin::soft_delete))
        .route("/comments/restore", post(admin::restore))
        .route("/comments/purge", post(admin::purge))
        .route("/comments/:comment_id/reply", post(admin::reply))
        .route("/events", get(sse::sse_handler));

    Router::new()
        .nest("/api/open", open)
        .nest("/api/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
