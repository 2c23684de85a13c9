use crate::http::error::{engine_error, timezone_offset, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use domain::{CommentId, ProjectId};
use engine::{CommentWrapper, DisplayComment, GetCommentsOptions, NewCommentInput};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub app_id: String,
    pub page_id: String,
    pub page: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub app_id: String,
    pub page_id: String,
    pub content: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub parent_id: Option<String>,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
}

/// Rejects malformed ids and projects that have been deleted.
pub(crate) async fn live_project(state: &AppState, raw: &str) -> ApiResult<ProjectId> {
    let project_id = ProjectId::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let project = state
        .reader
        .find_project(&project_id)
        .await
        .map_err(engine_error)?;
    if project.is_some_and(|p| p.is_deleted()) {
        return Err((StatusCode::NOT_FOUND, "Project not found".into()));
    }
    Ok(project_id)
}

pub async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<CommentWrapper>> {
    let project_id = live_project(&state, &query.app_id).await?;

    let mut comments = state
        .reader
        .get_comments(
            &project_id,
            timezone_offset(&headers),
            GetCommentsOptions {
                page_slug: Some(query.page_id),
                approved: Some(true),
                include_replies: true,
                page: query.page.unwrap_or(1),
                ..Default::default()
            },
        )
        .await
        .map_err(engine_error)?;
    comments.redact_emails();

    Ok(Json(comments))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<Json<DisplayComment>> {
    let project_id = live_project(&state, &payload.app_id).await?;

    let mut created = state
        .engine
        .create(NewCommentInput {
            project_id,
            page_slug: payload.page_id,
            page_title: payload.page_title,
            page_url: payload.page_url,
            content: payload.content,
            email: payload.email,
            nickname: payload.nickname,
            parent_id: payload.parent_id.map(CommentId::new_unchecked),
        })
        .await
        .map_err(engine_error)?;
    created.redact_emails();

    Ok(Json(created))
}
