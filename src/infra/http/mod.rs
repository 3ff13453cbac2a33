//! HTTP boundary: routes, principal extraction and response logging.

mod extract;
mod handlers;
mod middleware;
mod principal;
mod state;

pub use principal::{
    AdminPrincipal, PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER, Principal, PrincipalRejection,
};
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use self::middleware::{assign_request_id, observe_responses};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/posts", get(handlers::list_posts))
        .route("/posts/all", get(handlers::all_posts))
        .route("/posts/{id}", get(handlers::post_detail))
        .route("/posts/{id}/views", post(handlers::register_view))
        .route(
            "/posts/{id}/like",
            get(handlers::has_liked).post(handlers::toggle_like),
        )
        .route(
            "/posts/{id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/comments/{id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
        .route("/admin/posts", post(handlers::create_post))
        .route("/admin/posts/bulk-delete", post(handlers::bulk_delete_posts))
        .route(
            "/admin/posts/{id}",
            patch(handlers::update_post).delete(handlers::delete_post),
        )
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/admin/users/{id}",
            patch(handlers::update_user).delete(handlers::delete_user),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(observe_responses))
        .layer(axum_middleware::from_fn(assign_request_id))
}
