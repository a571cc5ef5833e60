//! User accounts

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_guid, parse_timestamp};
use kkd_common::time;

#[derive(Debug, Clone)]
pub struct User {
    pub guid: Uuid,
    pub username: String,
    /// Stored trimmed and lowercased
    pub email: String,
    pub password_hash: String,
    pub phone_num: String,
    pub local_id: i64,
    pub crop_name: Option<String>,
    /// Public URL of the profile image
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: String,
        email: &str,
        password_hash: String,
        phone_num: String,
        local_id: i64,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            username,
            email: normalize_email(email),
            password_hash,
            phone_num,
            local_id,
            crop_name: None,
            profile_image: None,
            created_at: time::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.get("guid");
        let created_at: String = row.get("created_at");

        Ok(Self {
            guid: parse_guid(&guid)?,
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            phone_num: row.get("phone_num"),
            local_id: row.get("local_id"),
            crop_name: row.get("crop_name"),
            profile_image: row.get("profile_image"),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Profile fields that may be changed; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub crop_name: Option<String>,
    pub profile_image: Option<String>,
    pub local_id: Option<i64>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.crop_name.is_none() && self.profile_image.is_none() && self.local_id.is_none()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const USER_COLUMNS: &str = "guid, username, email, password_hash, phone_num, local_id, \
                            crop_name, profile_image, created_at";

pub async fn insert_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, username, email, password_hash, phone_num, local_id,
                           crop_name, profile_image, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.guid.to_string())
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.phone_num)
    .bind(user.local_id)
    .bind(&user.crop_name)
    .bind(&user.profile_image)
    .bind(time::to_db(&user.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_user(pool: &SqlitePool, guid: &Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE guid = ?", USER_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn load_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

pub async fn update_password(pool: &SqlitePool, guid: &Uuid, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE guid = ?")
        .bind(password_hash)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply the provided profile fields; returns false if the user is gone
pub async fn update_profile(pool: &SqlitePool, guid: &Uuid, update: &ProfileUpdate) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            crop_name = COALESCE(?, crop_name),
            profile_image = COALESCE(?, profile_image),
            local_id = COALESCE(?, local_id)
        WHERE guid = ?
        "#,
    )
    .bind(&update.crop_name)
    .bind(&update.profile_image)
    .bind(update.local_id)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_profile_image(pool: &SqlitePool, guid: &Uuid, url: &str) -> Result<()> {
    sqlx::query("UPDATE users SET profile_image = ? WHERE guid = ?")
        .bind(url)
        .bind(guid.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;

    fn sample(email: &str) -> User {
        User::new(
            "rainuser".into(),
            email,
            "$2b$12$hash".into(),
            "010-1234-5678".into(),
            1,
        )
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = kkd_common::db::init_in_memory().await.unwrap();
        let user = sample(" Rain@Example.com ");
        insert_user(&pool, &user).await.unwrap();

        let loaded = load_user(&pool, &user.guid).await.unwrap().unwrap();
        assert_eq!(loaded.email, "rain@example.com");
        assert_eq!(loaded.created_at, user.created_at);
        assert!(loaded.crop_name.is_none());

        let by_email = load_user_by_email(&pool, "RAIN@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().guid, user.guid);
        assert!(email_exists(&pool, "rain@example.com").await.unwrap());
        assert!(load_user(&pool, &Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = kkd_common::db::init_in_memory().await.unwrap();
        insert_user(&pool, &sample("a@b.kr")).await.unwrap();

        let err = insert_user(&pool, &sample("A@B.kr")).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_partial_profile_update() {
        let pool = kkd_common::db::init_in_memory().await.unwrap();
        let user = sample("p@b.kr");
        insert_user(&pool, &user).await.unwrap();

        let update = ProfileUpdate {
            crop_name: Some("고추".into()),
            ..Default::default()
        };
        assert!(update_profile(&pool, &user.guid, &update).await.unwrap());

        let update = ProfileUpdate {
            local_id: Some(9),
            ..Default::default()
        };
        assert!(update_profile(&pool, &user.guid, &update).await.unwrap());

        let loaded = load_user(&pool, &user.guid).await.unwrap().unwrap();
        assert_eq!(loaded.crop_name.as_deref(), Some("고추"));
        assert_eq!(loaded.local_id, 9);
        assert!(ProfileUpdate::default().is_empty());
    }
}
