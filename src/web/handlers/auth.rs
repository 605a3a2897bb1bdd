use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::app::AppState;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{CreateUserRequest, LoginRequest, User};
use crate::web::middleware::{bearer_token, Locale};

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct LoginPrompt {
    pub message: String,
    pub next: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_prompt).post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
}

/// Target of the login redirect: tells the client why it landed here.
pub async fn login_prompt(
    State(state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Query(query): Query<NextQuery>,
) -> Json<LoginPrompt> {
    Json(LoginPrompt {
        message: state
            .localizer
            .gettext(locale.as_str(), state.login_manager.login_message),
        next: query.next,
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = state.auth_service.register(request).await?;
    let session = state.auth_service.create_session(user.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token: session.token,
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, session) = state.auth_service.login(request).await?;
    Ok(Json(AuthResponse {
        user,
        token: session.token,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;
    state.auth_service.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
