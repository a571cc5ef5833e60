//! Board endpoints: posts and likes

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::comments::{list_post_comments, CommentResponse};
use super::{non_blank, parse_id, AuthUser, MessageResponse};
use crate::db::{
    self,
    posts::{Post, PostUpdate},
};
use crate::{ApiError, ApiResult, AppState};
use kkd_common::time;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Full post as returned after creation
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub local_id: i64,
    pub likes: i64,
    pub created_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.guid.to_string(),
            user_id: post.user_id.to_string(),
            username: post.username,
            title: post.title,
            content: post.content,
            tags: post.tags,
            local_id: post.local_id,
            likes: post.likes,
            created_at: time::to_db(&post.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub comments: Vec<CommentResponse>,
}

/// One board listing row
#[derive(Debug, Serialize)]
pub struct PostSummary {
    /// 1-based position in the listing
    pub no: usize,
    pub id: String,
    pub title: String,
    pub username: String,
    /// `%Y-%m-%d %H:%M`
    pub created_at: String,
    pub likes: i64,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
}

impl PostListResponse {
    fn from_posts(posts: Vec<Post>) -> Self {
        let posts = posts
            .into_iter()
            .enumerate()
            .map(|(idx, post)| PostSummary {
                no: idx + 1,
                id: post.guid.to_string(),
                title: post.title,
                username: post.username,
                created_at: time::board_format(&post.created_at),
                likes: post.likes,
            })
            .collect();
        Self { posts }
    }
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: String,
    pub liked: bool,
    pub likes: i64,
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// POST /post
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let title = non_blank(Some(req.title))
        .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?;
    let content = non_blank(Some(req.content))
        .ok_or_else(|| ApiError::BadRequest("Content is required".to_string()))?;
    let tags = clean_tags(req.tags.unwrap_or_default());

    let post = Post::new(&user, title, content, tags);
    db::posts::insert_post(&state.db, &post).await?;

    info!(post_id = %post.guid, user_id = %user.guid, "Created post");

    Ok(Json(PostResponse::from(post)))
}

/// GET /posts
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<PostListResponse>> {
    let posts = db::posts::list_posts(&state.db, None).await?;
    Ok(Json(PostListResponse::from_posts(posts)))
}

/// GET /posts/local
///
/// Posts from the caller's region.
pub async fn list_local_posts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<PostListResponse>> {
    let posts = db::posts::list_posts(&state.db, Some(user.local_id)).await?;
    Ok(Json(PostListResponse::from_posts(posts)))
}

/// GET /posts/:post_id
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<PostDetailResponse>> {
    let post_id = parse_id(&post_id, "post")?;
    let post = load_existing(&state, &post_id).await?;
    let comments = db::comments::list_comments(&state.db, &post_id).await?;

    Ok(Json(PostDetailResponse {
        post: PostResponse::from(post),
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// PATCH /posts/:post_id
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let post_id = parse_id(&post_id, "post")?;
    let post = load_existing(&state, &post_id).await?;
    if post.user_id != user.guid {
        return Err(ApiError::Forbidden("수정 권한이 없습니다.".to_string()));
    }

    let update = PostUpdate {
        title: non_blank(req.title),
        content: non_blank(req.content),
        tags: req.tags.map(clean_tags),
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("수정할 내용이 없습니다.".to_string()));
    }

    db::posts::update_post(&state.db, &post_id, &update).await?;

    info!(post_id = %post_id, "Updated post");

    Ok(Json(MessageResponse::new("게시글이 수정되었습니다.")))
}

/// DELETE /posts/:post_id
///
/// Comments and likes go with the post.
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let post_id = parse_id(&post_id, "post")?;
    let post = load_existing(&state, &post_id).await?;
    if post.user_id != user.guid {
        return Err(ApiError::Forbidden("삭제 권한이 없습니다.".to_string()));
    }

    // A concurrent delete can remove the post after the ownership check
    if !db::posts::delete_post(&state.db, &post_id).await? {
        return Err(post_not_found());
    }

    info!(post_id = %post_id, "Deleted post");

    Ok(Json(MessageResponse::new("게시글이 삭제되었습니다.")))
}

/// POST /posts/:post_id/like
pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
) -> ApiResult<Json<LikeResponse>> {
    let post_id = parse_id(&post_id, "post")?;
    let toggle = db::likes::toggle_like(&state.db, &post_id, &user.guid)
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(LikeResponse {
        message: "좋아요 처리 완료".to_string(),
        liked: toggle.liked,
        likes: toggle.likes,
    }))
}

pub(crate) fn post_not_found() -> ApiError {
    ApiError::NotFound("게시글을 찾을 수 없습니다.".to_string())
}

async fn load_existing(state: &AppState, post_id: &uuid::Uuid) -> ApiResult<Post> {
    db::posts::load_post(&state.db, post_id)
        .await?
        .ok_or_else(post_not_found)
}

/// Build board routes
pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/post", post(create_post))
        .route("/posts", get(list_posts))
        .route("/posts/local", get(list_local_posts))
        .route(
            "/posts/:post_id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/posts/:post_id/comments", get(list_post_comments))
        .route("/posts/:post_id/like", post(like_post))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tags() {
        assert_eq!(
            clean_tags(vec![" 고추 ".into(), "".into(), "  ".into(), "벼".into()]),
            vec!["고추".to_string(), "벼".to_string()]
        );
    }
}
