//! Review handlers
//!
//! Check-item reviews, approve/reject decisions and review comments.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    Account, CheckItemReview, CommentId, ItemJudgment, Language, SoftwarePkgId,
};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub judgments: Vec<ItemJudgment>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    /// False when the decision was already on record
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub content: String,
}

/// PUT /v1/softwarepkg/:id/review
///
/// Submit check-item judgments. A reviewer's newest submission replaces
/// their previous one.
pub async fn review_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<StatusCode, AppError> {
    if req.judgments.is_empty() {
        return Err(AppError::BadRequest("judgments must not be empty".into()));
    }

    state
        .review_service
        .review(&SoftwarePkgId(id), &account, req.judgments)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/softwarepkg/:id/review/approve
pub async fn approve_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, AppError> {
    let changed = state
        .review_service
        .approve(&SoftwarePkgId(id), &account)
        .await?;
    Ok(Json(DecisionResponse { changed }))
}

/// PUT /v1/softwarepkg/:id/review/reject
pub async fn reject_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, AppError> {
    let changed = state
        .review_service
        .reject(&SoftwarePkgId(id), &account)
        .await?;
    Ok(Json(DecisionResponse { changed }))
}

/// GET /v1/softwarepkg/:id/checkitems
pub async fn list_check_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CheckItemReview>>, AppError> {
    let reviews = state
        .review_service
        .check_item_reviews(&SoftwarePkgId(id))
        .await?;
    Ok(Json(reviews))
}

/// POST /v1/softwarepkg/:id/review/comment
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = state
        .comment_service
        .add_comment(&SoftwarePkgId(id), &account, &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id.to_string(),
            author: comment.author.to_string(),
            content: comment.content.to_string(),
            created_at: comment.created_at.to_rfc3339(),
        }),
    ))
}

/// POST /v1/softwarepkg/:id/review/comment/:cid/translate
pub async fn translate_comment(
    State(state): State<AppState>,
    Path((id, cid)): Path<(Uuid, Uuid)>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, AppError> {
    let language: Language = req.language.parse()?;
    let content = state
        .comment_service
        .translate_comment(&SoftwarePkgId(id), &CommentId(cid), language)
        .await?;
    Ok(Json(TranslateResponse { content }))
}
