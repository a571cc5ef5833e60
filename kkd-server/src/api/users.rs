//! Account and profile endpoints

use axum::{
    extract::{Multipart, State},
    routing::{get, patch, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{non_blank, AuthUser, MessageResponse};
use crate::db::{self, users::ProfileUpdate, users::User};
use crate::services::passwords::{hash_password, verify_password};
use crate::services::uploads::{profile_file_name, UploadKind};
use crate::{ApiError, ApiResult, AppState};
use kkd_common::regions;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern is valid")
});

const LOGIN_FAILED: &str = "이메일 또는 비밀번호가 틀렸습니다.";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_num: String,
    pub local_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MyPage {
    pub username: String,
    pub email: String,
    pub local_id: i64,
    pub crop_name: String,
    pub region_name: String,
    pub profile_image: String,
}

impl From<&User> for MyPage {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            local_id: user.local_id,
            crop_name: user.crop_name.clone().unwrap_or_default(),
            region_name: regions::region_name_or_unknown(user.local_id).to_string(),
            profile_image: user.profile_image.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MyPageResponse {
    pub mypage: MyPage,
}

#[derive(Debug, Deserialize)]
pub struct MyPageUpdateRequest {
    pub crop_name: Option<String>,
    pub profile_image: Option<String>,
    pub local_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProfileImageResponse {
    pub message: String,
    pub profile_image_url: String,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("Password is required".to_string()));
    }
    regions::require_region(req.local_id)?;

    if db::users::email_exists(&state.db, &req.email).await? {
        return Err(ApiError::BadRequest("이미 등록된 이메일입니다.".to_string()));
    }

    let password_hash = hash_password(&req.password).await?;
    let user = User::new(
        username,
        &req.email,
        password_hash,
        req.phone_num.trim().to_string(),
        req.local_id,
    );

    // A concurrent registration can still win the race on the unique index
    db::users::insert_user(&state.db, &user).await.map_err(|e| {
        if db::is_unique_violation(&e) {
            ApiError::BadRequest("이미 등록된 이메일입니다.".to_string())
        } else {
            ApiError::Other(e)
        }
    })?;

    info!(user_id = %user.guid, "Registered user");

    Ok(Json(MessageResponse::new("회원가입 성공")))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = db::users::load_user_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(LOGIN_FAILED.to_string()))?;

    if !verify_password(&req.password, &user.password_hash).await? {
        return Err(ApiError::Unauthorized(LOGIN_FAILED.to_string()));
    }

    let access_token = state
        .tokens
        .issue(&user.guid)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = %user.guid, "User logged in");

    Ok(Json(LoginResponse {
        message: format!("{} 님, 환영합니다!", user.username),
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.tokens.ttl_seconds(),
    }))
}

/// PATCH /change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !verify_password(&req.current_password, &user.password_hash).await? {
        return Err(ApiError::BadRequest(
            "현재 비밀번호가 올바르지 않습니다.".to_string(),
        ));
    }
    if req.new_password.is_empty() {
        return Err(ApiError::BadRequest("New password is required".to_string()));
    }

    let password_hash = hash_password(&req.new_password).await?;
    db::users::update_password(&state.db, &user.guid, &password_hash).await?;

    info!(user_id = %user.guid, "Password changed");

    Ok(Json(MessageResponse::new(
        "비밀번호가 성공적으로 변경되었습니다.",
    )))
}

/// GET /mypage
pub async fn get_mypage(AuthUser(user): AuthUser) -> Json<MyPageResponse> {
    Json(MyPageResponse {
        mypage: MyPage::from(&user),
    })
}

/// PATCH /mypage
///
/// Only the provided fields change; an empty update is rejected.
pub async fn update_mypage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<MyPageUpdateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let update = ProfileUpdate {
        crop_name: req.crop_name,
        profile_image: req.profile_image,
        local_id: req.local_id,
    };

    if update.is_empty() {
        return Err(ApiError::BadRequest("업데이트할 값이 없습니다.".to_string()));
    }
    if let Some(local_id) = update.local_id {
        regions::require_region(local_id)?;
    }

    if !db::users::update_profile(&state.db, &user.guid, &update).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(MessageResponse::new(
        "마이페이지가 성공적으로 수정되었습니다.",
    )))
}

/// POST /upload-profile-image
///
/// Multipart field `file`; stored under `static/profile_images/`.
pub async fn upload_profile_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ProfileImageResponse>> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = non_blank(field.file_name().map(str::to_string))
            .unwrap_or_else(|| "profile".to_string());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, bytes));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Multipart field 'file' is required".to_string()))?;

    let info = state.uploads.validate_image(&file_name, &bytes)?;
    let stored_name = profile_file_name(&user.guid, &file_name);
    let stored = state
        .uploads
        .save(UploadKind::ProfileImage, &stored_name, &bytes, &info)
        .await?;

    db::users::set_profile_image(&state.db, &user.guid, &stored.url).await?;

    if let Some(previous) = user.profile_image.as_deref().filter(|p| *p != stored.url) {
        state
            .uploads
            .remove_replaced(UploadKind::ProfileImage, previous)
            .await;
    }

    info!(user_id = %user.guid, url = %stored.url, "Profile image updated");

    Ok(Json(ProfileImageResponse {
        message: "프로필 이미지 업로드 완료".to_string(),
        profile_image_url: stored.url,
    }))
}

/// Map a multipart read failure, keeping body-limit rejections as 413
pub(crate) fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Build account routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/change-password", patch(change_password))
        .route("/mypage", get(get_mypage).patch(update_mypage))
        .route("/upload-profile-image", post(upload_profile_image))
}
