//! Board posts

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::users::User;
use super::{parse_guid, parse_timestamp};
use kkd_common::time;

#[derive(Debug, Clone)]
pub struct Post {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Author's region at the time of writing
    pub local_id: i64,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author: &User, title: String, content: String, tags: Vec<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            user_id: author.guid,
            username: author.username.clone(),
            title,
            content,
            tags,
            local_id: author.local_id,
            likes: 0,
            created_at: time::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.get("guid");
        let user_id: String = row.get("user_id");
        let tags: String = row.get("tags");
        let created_at: String = row.get("created_at");

        Ok(Self {
            guid: parse_guid(&guid)?,
            user_id: parse_guid(&user_id)?,
            username: row.get("username"),
            title: row.get("title"),
            content: row.get("content"),
            tags: serde_json::from_str(&tags).context("Invalid stored tags")?,
            local_id: row.get("local_id"),
            likes: row.get("likes"),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Post fields that may be changed; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }
}

const POST_COLUMNS: &str =
    "guid, user_id, username, title, content, tags, local_id, likes, created_at";

pub async fn insert_post(pool: &SqlitePool, post: &Post) -> Result<()> {
    let tags = serde_json::to_string(&post.tags)?;

    sqlx::query(
        r#"
        INSERT INTO posts (guid, user_id, username, title, content, tags, local_id, likes, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post.guid.to_string())
    .bind(post.user_id.to_string())
    .bind(&post.username)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&tags)
    .bind(post.local_id)
    .bind(post.likes)
    .bind(time::to_db(&post.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_post(pool: &SqlitePool, guid: &Uuid) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE guid = ?", POST_COLUMNS))
        .bind(guid.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Post::from_row).transpose()
}

/// Posts newest first, optionally restricted to one region
pub async fn list_posts(pool: &SqlitePool, local_id: Option<i64>) -> Result<Vec<Post>> {
    let rows = match local_id {
        Some(local_id) => {
            sqlx::query(&format!(
                "SELECT {} FROM posts WHERE local_id = ? ORDER BY created_at DESC, rowid DESC",
                POST_COLUMNS
            ))
            .bind(local_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM posts ORDER BY created_at DESC, rowid DESC",
                POST_COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(Post::from_row).collect()
}

pub async fn update_post(pool: &SqlitePool, guid: &Uuid, update: &PostUpdate) -> Result<()> {
    let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"
        UPDATE posts SET
            title = COALESCE(?, title),
            content = COALESCE(?, content),
            tags = COALESCE(?, tags)
        WHERE guid = ?
        "#,
    )
    .bind(&update.title)
    .bind(&update.content)
    .bind(&tags)
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a post together with its comments and likes
pub async fn delete_post(pool: &SqlitePool, guid: &Uuid) -> Result<bool> {
    let id = guid.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM post_likes WHERE post_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM posts WHERE guid = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}
