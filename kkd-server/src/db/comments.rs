//! Post comments

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::users::User;
use super::{parse_guid, parse_timestamp};
use kkd_common::time;

#[derive(Debug, Clone)]
pub struct Comment {
    pub guid: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author: &User, post_id: Uuid, content: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            post_id,
            user_id: author.guid,
            username: author.username.clone(),
            content,
            created_at: time::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let guid: String = row.get("guid");
        let post_id: String = row.get("post_id");
        let user_id: String = row.get("user_id");
        let created_at: String = row.get("created_at");

        Ok(Self {
            guid: parse_guid(&guid)?,
            post_id: parse_guid(&post_id)?,
            user_id: parse_guid(&user_id)?,
            username: row.get("username"),
            content: row.get("content"),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

pub async fn insert_comment(pool: &SqlitePool, comment: &Comment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO comments (guid, post_id, user_id, username, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.guid.to_string())
    .bind(comment.post_id.to_string())
    .bind(comment.user_id.to_string())
    .bind(&comment.username)
    .bind(&comment.content)
    .bind(time::to_db(&comment.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Comments on a post, oldest first
pub async fn list_comments(pool: &SqlitePool, post_id: &Uuid) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, post_id, user_id, username, content, created_at
        FROM comments
        WHERE post_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(post_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(Comment::from_row).collect()
}
