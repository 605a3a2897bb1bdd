use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::core::error::{AppError, AppResult};
use crate::core::types::{CreateUserRequest, LoginRequest, User};
use crate::crypto::service::CryptoService;
use crate::storage::database::Database;

const SESSION_DAYS: i64 = 30;

pub struct AuthService {
    db: Arc<Database>,
    crypto: Arc<CryptoService>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthService {
    pub fn new(db: Arc<Database>, crypto: Arc<CryptoService>) -> Self {
        Self { db, crypto }
    }

    /// Register a new user
    pub async fn register(&self, request: CreateUserRequest) -> AppResult<User> {
        let username = request.username.trim();
        let email = request.email.trim();
        if username.is_empty() || request.password.is_empty() {
            return Err(AppError::InvalidRequest(
                "Username and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AppError::InvalidRequest("Invalid email address".to_string()));
        }

        let taken: Option<i64> = sqlx::query_scalar(r#"SELECT id FROM "user" WHERE username = ?"#)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        if taken.is_some() {
            return Err(AppError::InvalidRequest(
                "Please use a different username.".to_string(),
            ));
        }

        let taken: Option<i64> = sqlx::query_scalar(r#"SELECT id FROM "user" WHERE email = ?"#)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;
        if taken.is_some() {
            return Err(AppError::InvalidRequest(
                "Please use a different email address.".to_string(),
            ));
        }

        let password_hash = self.crypto.hash_password(&request.password)?;
        let id = sqlx::query(
            r#"INSERT INTO "user" (username, email, password_hash) VALUES (?, ?, ?)"#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        info!(user_id = id, "Registered user {}", username);
        self.get_user(id).await
    }

    /// Login a user
    pub async fn login(&self, request: LoginRequest) -> AppResult<(User, Session)> {
        let record: Option<(i64, String)> =
            sqlx::query_as(r#"SELECT id, password_hash FROM "user" WHERE username = ?"#)
                .bind(request.username.trim())
                .fetch_optional(self.db.pool())
                .await?;

        let (user_id, password_hash) =
            record.ok_or_else(|| AppError::Auth("Invalid username or password".to_string()))?;
        if !self.crypto.verify_password(&request.password, &password_hash)? {
            return Err(AppError::Auth("Invalid username or password".to_string()));
        }

        let session = self.create_session(user_id).await?;
        self.touch(user_id).await?;
        let user = self.get_user(user_id).await?;

        Ok((user, session))
    }

    /// Create a new session for a user
    pub async fn create_session(&self, user_id: i64) -> AppResult<Session> {
        let token = self.crypto.generate_token()?;
        let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

        sqlx::query("INSERT INTO session (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(self.crypto.token_digest(&token))
            .bind(user_id)
            .bind(expires_at)
            .execute(self.db.pool())
            .await?;

        Ok(Session {
            user_id,
            token,
            expires_at,
        })
    }

    /// Validate a session token
    pub async fn validate_session(&self, token: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.about_me, u.last_seen
            FROM session s
            JOIN "user" u ON s.user_id = u.id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(self.crypto.token_digest(token))
        .bind(Utc::now())
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".to_string()))?;

        Ok(user)
    }

    /// Logout a user (invalidate session)
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM session WHERE token_hash = ?")
            .bind(self.crypto.token_digest(token))
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Records activity for the profile's "last seen" line.
    pub async fn touch(&self, user_id: i64) -> AppResult<()> {
        sqlx::query(r#"UPDATE "user" SET last_seen = ? WHERE id = ?"#)
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, about_me, last_seen FROM "user" WHERE id = ?"#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, about_me, last_seen FROM "user" WHERE username = ?"#,
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
    }

    pub async fn list_users(&self, page: u32, per_page: u32) -> AppResult<(Vec<User>, i64)> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, about_me, last_seen FROM "user" ORDER BY id LIMIT ? OFFSET ?"#,
        )
        .bind(i64::from(per_page))
        .bind(i64::from(page.saturating_sub(1)) * i64::from(per_page))
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
            .fetch_one(self.db.pool())
            .await?;

        Ok((users, total))
    }
}
