use crate::http::error::{engine_error, timezone_offset, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use domain::{CommentId, Project, ProjectId};
use engine::{CommentWrapper, CommenterPage, DisplayComment, GetCommentsOptions};
use serde::{Deserialize, Serialize};

pub(crate) fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".into(),
        ))?;
    let expected_token = format!("Bearer {}", state.admin_token);
    if auth_header != expected_token {
        return Err((StatusCode::FORBIDDEN, "Invalid Admin Token".into()));
    }
    Ok(())
}

fn project_id(raw: String) -> ApiResult<ProjectId> {
    ProjectId::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, e))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProjectRequest {
    pub id: String,
    pub owner_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub approved: Option<bool>,
    pub page_slug: Option<String>,
    pub parent_id: Option<String>,
    pub owner_id: Option<String>,
    pub include_replies: Option<bool>,
    pub include_deleted_parents: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<CommentId>,
}

#[derive(Deserialize)]
pub struct EmailsRequest {
    pub emails: Vec<String>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

pub async fn upsert_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpsertProjectRequest>,
) -> ApiResult<Json<Project>> {
    authorize(&state, &headers)?;
    let id = project_id(payload.id)?;
    let project = state
        .engine
        .register_project(&id, payload.owner_id.as_deref())
        .await
        .map_err(engine_error)?;
    Ok(Json(project))
}

pub async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> ApiResult<Json<CommentWrapper>> {
    authorize(&state, &headers)?;
    let id = project_id(project)?;
    let comments = state
        .reader
        .get_comments(
            &id,
            timezone_offset(&headers),
            GetCommentsOptions {
                parent_id: query.parent_id.map(CommentId::new_unchecked),
                approved: query.approved,
                page_slug: query.page_slug,
                owner_id: query.owner_id,
                page: query.page.unwrap_or(1),
                page_size: query.page_size,
                include_replies: query.include_replies.unwrap_or(false),
                include_deleted_parents: query.include_deleted_parents.unwrap_or(false),
                admin: true,
            },
        )
        .await
        .map_err(engine_error)?;
    Ok(Json(comments))
}

pub async fn deleted_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<CommentWrapper>> {
    authorize(&state, &headers)?;
    let id = project_id(project)?;
    let comments = state
        .reader
        .get_deleted_comments(
            &id,
            timezone_offset(&headers),
            query.page.unwrap_or(1),
            query.page_size,
        )
        .await
        .map_err(engine_error)?;
    Ok(Json(comments))
}

pub async fn list_commenters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<CommenterPage>> {
    authorize(&state, &headers)?;
    let id = project_id(project)?;
    let commenters = state
        .reader
        .list_commenters(&id, query.page.unwrap_or(1))
        .await
        .map_err(engine_error)?;
    Ok(Json(commenters))
}

pub async fn delete_by_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(payload): Json<EmailsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let id = project_id(project)?;
    let count = state
        .engine
        .soft_delete_by_emails(&id, &payload.emails)
        .await
        .map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let count = state.engine.approve(&payload.ids).await.map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn unapprove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let count = state
        .engine
        .unapprove(&payload.ids)
        .await
        .map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn soft_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let count = state
        .engine
        .soft_delete(&payload.ids)
        .await
        .map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let count = state.engine.restore(&payload.ids).await.map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn purge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IdsRequest>,
) -> ApiResult<Json<CountResponse>> {
    authorize(&state, &headers)?;
    let count = state
        .engine
        .cascade_hard_delete(&payload.ids)
        .await
        .map_err(engine_error)?;
    Ok(Json(CountResponse { count }))
}

pub async fn reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
    Json(payload): Json<ReplyRequest>,
) -> ApiResult<Json<DisplayComment>> {
    authorize(&state, &headers)?;
    let reply = state
        .engine
        .create_as_moderator(
            &CommentId::new_unchecked(comment_id),
            &payload.content,
            &state.moderator,
        )
        .await
        .map_err(engine_error)?;
    Ok(Json(reply))
}
