//! Comment endpoints

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::posts::post_not_found;
use super::{non_blank, parse_id, AuthUser};
use crate::db::{self, comments::Comment};
use crate::{ApiError, ApiResult, AppState};
use kkd_common::time;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.guid.to_string(),
            post_id: comment.post_id.to_string(),
            user_id: comment.user_id.to_string(),
            username: comment.username,
            content: comment.content,
            created_at: time::to_db(&comment.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
}

/// POST /comments
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let post_id = parse_id(&req.post_id, "post")?;
    let content = non_blank(Some(req.content))
        .ok_or_else(|| ApiError::BadRequest("Comment content is required".to_string()))?;

    if db::posts::load_post(&state.db, &post_id).await?.is_none() {
        return Err(post_not_found());
    }

    let comment = Comment::new(&user, post_id, content);
    db::comments::insert_comment(&state.db, &comment).await?;

    info!(comment_id = %comment.guid, post_id = %post_id, "Added comment");

    Ok(Json(CommentResponse::from(comment)))
}

/// GET /posts/:post_id/comments
///
/// Oldest first.
pub async fn list_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<CommentListResponse>> {
    let post_id = parse_id(&post_id, "post")?;
    if db::posts::load_post(&state.db, &post_id).await?.is_none() {
        return Err(post_not_found());
    }

    let comments = db::comments::list_comments(&state.db, &post_id).await?;

    Ok(Json(CommentListResponse {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// Build comment routes
pub fn comment_routes() -> Router<AppState> {
    Router::new().route("/comments", post(create_comment))
}
