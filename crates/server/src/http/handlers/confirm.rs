use crate::http::error::{engine_error, token_error, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use engine::{AcceptNotifyClaims, ApproveClaims, EmailVerifyClaims};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
    pub unsubscribe: Option<u8>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    pub reply_content: Option<String>,
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<Value>> {
    let claims: EmailVerifyClaims = state
        .tokens
        .verify(&query.token, state.clock.now())
        .map_err(token_error)?;

    let approved = state
        .engine
        .confirm_email(&claims.email, &claims.project_id, claims.comment_id.as_ref())
        .await
        .map_err(engine_error)?;

    Ok(Json(json!({ "verified": true, "approved": approved })))
}

pub async fn confirm_reply_notification(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<Value>> {
    let claims: AcceptNotifyClaims = state
        .tokens
        .verify(&query.token, state.clock.now())
        .map_err(token_error)?;

    let enabled = query.unsubscribe != Some(1);
    state
        .engine
        .set_reply_notification(&claims.comment_id, enabled)
        .await
        .map_err(engine_error)?;
    info!(comment = %claims.comment_id, enabled, "reply notification updated");

    Ok(Json(json!({ "notify": enabled })))
}

pub async fn approve_get(
    state: State<AppState>,
    query: Query<TokenQuery>,
) -> ApiResult<Json<Value>> {
    approve(state, query, None).await
}

pub async fn approve_post(
    state: State<AppState>,
    query: Query<TokenQuery>,
    Json(body): Json<ApproveBody>,
) -> ApiResult<Json<Value>> {
    approve(state, query, body.reply_content).await
}

async fn approve(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    reply: Option<String>,
) -> ApiResult<Json<Value>> {
    let claims: ApproveClaims = state
        .tokens
        .verify(&query.token, state.clock.now())
        .map_err(token_error)?;

    let reply = state
        .engine
        .approve_and_reply(&claims.comment_id, &claims.moderator, reply.as_deref())
        .await
        .map_err(engine_error)?;

    Ok(Json(json!({ "approved": true, "reply": reply })))
}
