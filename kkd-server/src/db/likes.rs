//! Post likes
//!
//! One `post_likes` row per (post, user). Toggling flips that row and moves
//! the post's `likes` counter in the same transaction.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use kkd_common::time;

/// State after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: i64,
}

/// Toggle a user's like on a post; `None` if the post does not exist
pub async fn toggle_like(
    pool: &SqlitePool,
    post_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<LikeToggle>> {
    let post_id = post_id.to_string();
    let user_id = user_id.to_string();
    let mut tx = pool.begin().await?;

    // Opening with a write takes the lock up front so busy_timeout applies
    let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
        .bind(&post_id)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    if removed {
        sqlx::query("UPDATE posts SET likes = MAX(likes - 1, 0) WHERE guid = ?")
            .bind(&post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        let inserted = sqlx::query(
            "INSERT INTO post_likes (guid, post_id, user_id, liked_at) \
             SELECT ?, guid, ?, ? FROM posts WHERE guid = ?",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id)
        .bind(time::to_db(&time::now()))
        .bind(&post_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE posts SET likes = likes + 1 WHERE guid = ?")
            .bind(&post_id)
            .execute(&mut *tx)
            .await?;
    }

    let likes: i64 = sqlx::query_scalar("SELECT likes FROM posts WHERE guid = ?")
        .bind(&post_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(LikeToggle {
        liked: !removed,
        likes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::posts::{insert_post, load_post, Post};
    use crate::db::users::{insert_user, User};

    #[tokio::test]
    async fn test_toggle_twice_restores_count() {
        let pool = kkd_common::db::init_in_memory().await.unwrap();
        let alice = User::new("alice".into(), "a@b.kr", "h".into(), "010".into(), 1);
        let bob = User::new("bob".into(), "b@b.kr", "h".into(), "010".into(), 1);
        insert_user(&pool, &alice).await.unwrap();
        insert_user(&pool, &bob).await.unwrap();
        let post = Post::new(&alice, "t".into(), "c".into(), vec![]);
        insert_post(&pool, &post).await.unwrap();

        let first = toggle_like(&pool, &post.guid, &alice.guid).await.unwrap().unwrap();
        assert_eq!(first, LikeToggle { liked: true, likes: 1 });

        let other = toggle_like(&pool, &post.guid, &bob.guid).await.unwrap().unwrap();
        assert_eq!(other, LikeToggle { liked: true, likes: 2 });

        let undo = toggle_like(&pool, &post.guid, &alice.guid).await.unwrap().unwrap();
        assert_eq!(undo, LikeToggle { liked: false, likes: 1 });

        assert_eq!(load_post(&pool, &post.guid).await.unwrap().unwrap().likes, 1);
    }

    #[tokio::test]
    async fn test_toggle_missing_post() {
        let pool = kkd_common::db::init_in_memory().await.unwrap();
        let result = toggle_like(&pool, &Uuid::new_v4(), &Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = kkd_common::db::init_database(&dir.path().join("kkd.db"))
            .await
            .unwrap();

        let author = User::new("author".into(), "author@b.kr", "h".into(), "010".into(), 1);
        insert_user(&pool, &author).await.unwrap();
        let post = Post::new(&author, "t".into(), "c".into(), vec![]);
        insert_post(&pool, &post).await.unwrap();

        let mut likers = Vec::new();
        for i in 0..40 {
            let user = User::new(
                format!("user{}", i),
                &format!("user{}@b.kr", i),
                "h".into(),
                "010".into(),
                1,
            );
            insert_user(&pool, &user).await.unwrap();
            likers.push(user.guid);
        }

        let handles: Vec<_> = likers
            .into_iter()
            .map(|user_id| {
                let pool = pool.clone();
                let post_id = post.guid;
                tokio::spawn(async move { toggle_like(&pool, &post_id, &user_id).await })
            })
            .collect();

        for handle in handles {
            let toggle = handle.await.unwrap().unwrap().unwrap();
            assert!(toggle.liked);
        }

        assert_eq!(load_post(&pool, &post.guid).await.unwrap().unwrap().likes, 40);
    }
}
