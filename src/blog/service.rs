use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::core::error::{AppError, AppResult};
use crate::core::types::{CreatePostRequest, Page, Post};
use crate::search::Search;
use crate::storage::database::Database;

pub const POST_INDEX: &str = "post";
const MAX_POST_LENGTH: usize = 140;
const POST_COLUMNS: &str = "id, body, timestamp, user_id, language";

pub struct BlogService {
    db: Arc<Database>,
    search: Arc<Search>,
}

impl BlogService {
    pub fn new(db: Arc<Database>, search: Arc<Search>) -> Self {
        Self { db, search }
    }

    /// Stores a post and, when search is enabled, indexes it. An indexing
    /// failure is logged and does not undo the post.
    pub async fn create_post(&self, author_id: i64, request: CreatePostRequest) -> AppResult<Post> {
        let body = request.body.trim();
        if body.is_empty() {
            return Err(AppError::InvalidRequest("Post body is required".to_string()));
        }
        if body.chars().count() > MAX_POST_LENGTH {
            return Err(AppError::InvalidRequest(format!(
                "Posts are limited to {} characters",
                MAX_POST_LENGTH
            )));
        }

        let timestamp = Utc::now();
        let language = request.language.filter(|lang| !lang.trim().is_empty());
        let id = sqlx::query("INSERT INTO post (body, timestamp, user_id, language) VALUES (?, ?, ?, ?)")
            .bind(body)
            .bind(timestamp)
            .bind(author_id)
            .bind(&language)
            .execute(self.db.pool())
            .await?
            .last_insert_rowid();

        let post = Post {
            id,
            body: body.to_string(),
            timestamp,
            user_id: author_id,
            language,
        };

        if let Search::Enabled(client) = self.search.as_ref() {
            if let Err(e) = client
                .add_to_index(POST_INDEX, post.id, &json!({ "body": post.body }))
                .await
            {
                warn!(post_id = post.id, "Post not indexed: {}", e);
            }
        }

        Ok(post)
    }

    /// Every post, newest first.
    pub async fn explore(&self, page: u32, per_page: u32) -> AppResult<Page<Post>> {
        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM post ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS
        ))
        .bind(i64::from(per_page))
        .bind(offset(page, per_page))
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post")
            .fetch_one(self.db.pool())
            .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    pub async fn user_posts(&self, user_id: i64, page: u32, per_page: u32) -> AppResult<Page<Post>> {
        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM post WHERE user_id = ? ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS
        ))
        .bind(user_id)
        .bind(i64::from(per_page))
        .bind(offset(page, per_page))
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// Timeline: the user's own posts plus posts of everyone they follow.
    pub async fn followed_posts(&self, user_id: i64, page: u32, per_page: u32) -> AppResult<Page<Post>> {
        const FILTER: &str =
            "user_id = ? OR user_id IN (SELECT followed_id FROM followers WHERE follower_id = ?)";

        let items = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM post WHERE {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, FILTER
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(i64::from(per_page))
        .bind(offset(page, per_page))
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM post WHERE {}", FILTER))
            .bind(user_id)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(Page::new(items, page, per_page, total))
    }

    /// Full-text search over posts. Fails with `Unavailable` when search is disabled.
    pub async fn search_posts(&self, query: &str, page: u32, per_page: u32) -> AppResult<Page<Post>> {
        let client = match self.search.as_ref() {
            Search::Enabled(client) => client,
            Search::Disabled => {
                return Err(AppError::Unavailable("Search is not configured".to_string()))
            }
        };

        let (ids, total) = client.query_index(POST_INDEX, query, page, per_page).await?;
        let items = self.posts_by_ids(&ids).await?;
        Ok(Page::new(items, page, per_page, total))
    }

    /// Loads posts keeping the order of `ids`; ids without a row are skipped.
    pub async fn posts_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM post WHERE id IN (", POST_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let mut found: HashMap<i64, Post> = builder
            .build_query_as::<Post>()
            .fetch_all(self.db.pool())
            .await?
            .into_iter()
            .map(|post| (post.id, post))
            .collect();

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }
}

fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::Migrations;

    async fn seeded() -> (BlogService, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        Migrations::new(&db).upgrade().await.unwrap();
        sqlx::query(
            r#"INSERT INTO "user" (id, username, email, password_hash) VALUES
               (1, 'john', 'john@example.com', 'x'),
               (2, 'susan', 'susan@example.com', 'x'),
               (3, 'mary', 'mary@example.com', 'x')"#,
        )
        .execute(db.pool())
        .await
        .unwrap();
        (BlogService::new(db.clone(), Arc::new(Search::Disabled)), db)
    }

    fn post(body: &str) -> CreatePostRequest {
        CreatePostRequest {
            body: body.to_string(),
            language: None,
        }
    }

    #[tokio::test]
    async fn timeline_includes_own_and_followed_posts() {
        let (blog, db) = seeded().await;
        blog.create_post(1, post("from john")).await.unwrap();
        blog.create_post(2, post("from susan")).await.unwrap();
        blog.create_post(3, post("from mary")).await.unwrap();
        sqlx::query("INSERT INTO followers (follower_id, followed_id) VALUES (1, 2), (1, 2)")
            .execute(db.pool())
            .await
            .unwrap();

        let timeline = blog.followed_posts(1, 1, 10).await.unwrap();
        let bodies: Vec<&str> = timeline.items.iter().map(|p| p.body.as_str()).collect();

        assert_eq!(bodies, vec!["from susan", "from john"]);
        assert_eq!(timeline.total, 2);
    }

    #[tokio::test]
    async fn explore_paginates_newest_first() {
        let (blog, _db) = seeded().await;
        for n in 0..7 {
            blog.create_post(1 + n % 3, post(&format!("post {}", n))).await.unwrap();
        }

        let first = blog.explore(1, 5).await.unwrap();
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.items[0].body, "post 6");
        assert!(first.has_next);
        assert!(!first.has_prev);

        let second = blog.explore(2, 5).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_next);
        assert!(second.has_prev);
    }

    #[tokio::test]
    async fn empty_and_oversized_posts_are_rejected() {
        let (blog, _db) = seeded().await;

        assert!(matches!(blog.create_post(1, post("   ")).await, Err(AppError::InvalidRequest(_))));
        let long = "x".repeat(141);
        assert!(matches!(blog.create_post(1, post(&long)).await, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn posts_by_ids_keeps_requested_order() {
        let (blog, _db) = seeded().await;
        let a = blog.create_post(1, post("a")).await.unwrap();
        let b = blog.create_post(2, post("b")).await.unwrap();

        let posts = blog.posts_by_ids(&[b.id, 999, a.id]).await.unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn search_requires_configured_index() {
        let (blog, _db) = seeded().await;
        assert!(matches!(
            blog.search_posts("hello", 1, 5).await,
            Err(AppError::Unavailable(_))
        ));
    }
}
