use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::admin::{
    CreatePostCommand, CreateUserCommand, UpdateUserCommand, UserListParams,
};
use crate::application::error::{AppError, ErrorReport};
use crate::application::query::PostListParams;
use crate::application::repos::PostPatch;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::principal::{AdminPrincipal, Principal};
use super::state::HttpState;

type HandlerResult = Result<Response, AppError>;

#[derive(Debug, Deserialize)]
pub(super) struct CommentBody {
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreatePostBody {
    /// Defaults to the calling admin.
    author_id: Option<Uuid>,
    title: String,
    content: String,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkDeleteBody {
    ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct LikedBody {
    liked: bool,
}

#[derive(Debug, Serialize)]
struct RemovedBody {
    removed: usize,
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub(super) async fn list_posts(
    State(state): State<HttpState>,
    ApiQuery(params): ApiQuery<PostListParams>,
) -> HandlerResult {
    let page = state.feed.list_posts(&params).await?;
    Ok(Json(page).into_response())
}

pub(super) async fn all_posts(State(state): State<HttpState>) -> HandlerResult {
    let posts = state.feed.all_posts().await?;
    Ok(Json(posts).into_response())
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let detail = state.feed.post_detail(id).await?;
    Ok(Json(detail).into_response())
}

pub(super) async fn register_view(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    state.engagement.register_view(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(super) async fn toggle_like(
    State(state): State<HttpState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let outcome = state.engagement.toggle_like(principal.id, id).await?;
    Ok(Json(outcome).into_response())
}

pub(super) async fn has_liked(
    State(state): State<HttpState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let liked = state.engagement.has_liked(principal.id, id).await?;
    Ok(Json(LikedBody { liked }).into_response())
}

pub(super) async fn list_comments(
    State(state): State<HttpState>,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let comments = state.comments.list_by_post(id).await?;
    Ok(Json(comments).into_response())
}

pub(super) async fn create_comment(
    State(state): State<HttpState>,
    principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CommentBody>,
) -> HandlerResult {
    let comment = state
        .comments
        .create(id, principal.id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub(super) async fn update_comment(
    State(state): State<HttpState>,
    _principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CommentBody>,
) -> HandlerResult {
    let comment = state.comments.update(id, &body.content).await?;
    Ok(Json(comment).into_response())
}

pub(super) async fn delete_comment(
    State(state): State<HttpState>,
    _principal: Principal,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let comment = state.comments.delete(id).await?;
    Ok(Json(comment).into_response())
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    AdminPrincipal(admin): AdminPrincipal,
    ApiJson(body): ApiJson<CreatePostBody>,
) -> HandlerResult {
    let post = state
        .admin_posts
        .create(CreatePostCommand {
            author_id: body.author_id.unwrap_or(admin.id),
            title: body.title,
            content: body.content,
            published: body.published,
            tags: body.tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

pub(super) async fn update_post(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> HandlerResult {
    let post = state.admin_posts.update(id, patch).await?;
    Ok(Json(post).into_response())
}

pub(super) async fn delete_post(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let post = state.admin_posts.delete(id).await?;
    Ok(Json(post).into_response())
}

pub(super) async fn bulk_delete_posts(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiJson(body): ApiJson<BulkDeleteBody>,
) -> HandlerResult {
    let removed = state.admin_posts.bulk_delete(&body.ids).await?;
    Ok(Json(RemovedBody { removed }).into_response())
}

pub(super) async fn list_users(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiQuery(params): ApiQuery<UserListParams>,
) -> HandlerResult {
    let page = state.admin_users.list(&params).await?;
    Ok(Json(page).into_response())
}

pub(super) async fn create_user(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiJson(command): ApiJson<CreateUserCommand>,
) -> HandlerResult {
    let user = state.admin_users.create(command).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(super) async fn update_user(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(command): ApiJson<UpdateUserCommand>,
) -> HandlerResult {
    let user = state.admin_users.update(id, command).await?;
    Ok(Json(user).into_response())
}

pub(super) async fn delete_user(
    State(state): State<HttpState>,
    _admin: AdminPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> HandlerResult {
    let user = state.admin_users.delete(id).await?;
    Ok(Json(user).into_response())
}
