use std::sync::Arc;
use tracing::info;

use crate::core::error::{AppError, AppResult};
use crate::core::types::User;
use crate::storage::database::Database;

/// Follow edges between users. The table has no uniqueness constraint, so
/// `follow` inserts only when no identical edge exists, in one statement.
pub struct SocialService {
    db: Arc<Database>,
}

impl SocialService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns `false` when the edge already existed.
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> AppResult<bool> {
        if follower_id == followed_id {
            return Err(AppError::InvalidRequest("You cannot follow yourself!".to_string()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO followers (follower_id, followed_id)
            SELECT ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM followers WHERE follower_id = ? AND followed_id = ?
            )
            "#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(follower_id, followed_id, "Follow edge created");
        }
        Ok(inserted > 0)
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> AppResult<bool> {
        let removed = sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        if removed > 0 {
            info!(follower_id, followed_id, "Follow edge removed");
        }
        Ok(removed > 0)
    }

    pub async fn followers(&self, user_id: i64) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT DISTINCT u.id, u.username, u.email, u.about_me, u.last_seen
            FROM followers f
            JOIN "user" u ON u.id = f.follower_id
            WHERE f.followed_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(users)
    }

    pub async fn followed(&self, user_id: i64) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT DISTINCT u.id, u.username, u.email, u.about_me, u.last_seen
            FROM followers f
            JOIN "user" u ON u.id = f.followed_id
            WHERE f.follower_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(users)
    }

    pub async fn followers_count(&self, user_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT follower_id) FROM followers WHERE followed_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    pub async fn followed_count(&self, user_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT followed_id) FROM followers WHERE follower_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}
