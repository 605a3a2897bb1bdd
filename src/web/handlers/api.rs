use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::core::app::AppState;
use crate::core::error::AppResult;
use crate::core::types::{CreateUserRequest, Page, User};
use crate::web::handlers::main::PageQuery;
use crate::web::middleware::token_required;

/// JSON API. Everything except account creation needs a bearer token.
pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let token = from_fn_with_state(state.clone(), token_required);

    Router::new()
        .route(
            "/users",
            get(list_users).route_layer(token.clone()).post(create_user),
        )
        .route("/users/:id", get(get_user).route_layer(token.clone()))
        .route("/users/:id/followers", get(get_followers).route_layer(token.clone()))
        .route("/users/:id/followed", get(get_followed).route_layer(token))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    Ok(Json(state.auth_service.get_user(id).await?))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<User>>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.settings.posts_per_page;
    let (users, total) = state.auth_service.list_users(page, per_page).await?;
    Ok(Json(Page::new(users, page, per_page, total)))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_followers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<User>>> {
    let user = state.auth_service.get_user(id).await?;
    Ok(Json(state.social_service.followers(user.id).await?))
}

pub async fn get_followed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<User>>> {
    let user = state.auth_service.get_user(id).await?;
    Ok(Json(state.social_service.followed(user.id).await?))
}
