use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::core::app::AppState;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{
    CreatePostRequest, Page, Post, TranslateRequest, TranslateResponse, User, UserProfile,
};
use crate::i18n::Message;
use crate::search::Search;
use crate::web::middleware::{login_required, Locale};

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u32>,
}

#[derive(Serialize)]
pub struct Flash {
    pub message: String,
}

#[derive(Serialize)]
pub struct PublishedPost {
    pub post: Post,
    pub message: String,
}

#[derive(Serialize)]
pub struct QueuedTask {
    pub job_id: String,
    pub message: String,
}

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let members = Router::new()
        .route("/", get(index).post(publish))
        .route("/index", get(index))
        .route("/follow/:username", post(follow))
        .route("/unfollow/:username", post(unfollow))
        .route("/translate", post(translate))
        .route("/search", get(search))
        .route("/export_posts", post(export_posts))
        .route_layer(from_fn_with_state(state.clone(), login_required));

    let public = Router::new()
        .route("/explore", get(explore))
        .route("/user/:username", get(user_profile));

    members.merge(public)
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<Post>>> {
    let page = state
        .blog_service
        .followed_posts(user.id, query.page(), state.settings.posts_per_page)
        .await?;
    Ok(Json(page))
}

pub async fn publish(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Extension(locale): Extension<Locale>,
    Json(request): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PublishedPost>)> {
    let post = state.blog_service.create_post(user.id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(PublishedPost {
            post,
            message: state.localizer.gettext(locale.as_str(), Message::PostPublished),
        }),
    ))
}

pub async fn explore(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<Post>>> {
    let page = state
        .blog_service
        .explore(query.page(), state.settings.posts_per_page)
        .await?;
    Ok(Json(page))
}

async fn find_user(state: &AppState, username: &str, locale: &Locale) -> AppResult<User> {
    match state.auth_service.get_user_by_username(username).await {
        Err(AppError::NotFound(_)) => Err(AppError::NotFound(
            state
                .localizer
                .gettext(locale.as_str(), Message::UserNotFound { username }),
        )),
        other => other,
    }
}

pub async fn user_profile(
    State(state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<UserProfile>> {
    let user = find_user(&state, &username, &locale).await?;
    let posts = state
        .blog_service
        .user_posts(user.id, query.page(), state.settings.posts_per_page)
        .await?;
    let followers_count = state.social_service.followers_count(user.id).await?;
    let followed_count = state.social_service.followed_count(user.id).await?;

    Ok(Json(UserProfile {
        user,
        followers_count,
        followed_count,
        posts,
    }))
}

pub async fn follow(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<User>,
    Extension(locale): Extension<Locale>,
    Path(username): Path<String>,
) -> AppResult<Json<Flash>> {
    let target = find_user(&state, &username, &locale).await?;
    if target.id == current.id {
        return Err(AppError::InvalidRequest(
            state.localizer.gettext(locale.as_str(), Message::CannotFollowSelf),
        ));
    }

    state.social_service.follow(current.id, target.id).await?;
    Ok(Json(Flash {
        message: state.localizer.gettext(
            locale.as_str(),
            Message::NowFollowing {
                username: &username,
            },
        ),
    }))
}

pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<User>,
    Extension(locale): Extension<Locale>,
    Path(username): Path<String>,
) -> AppResult<Json<Flash>> {
    let target = find_user(&state, &username, &locale).await?;
    if target.id == current.id {
        return Err(AppError::InvalidRequest(
            state.localizer.gettext(locale.as_str(), Message::CannotFollowSelf),
        ));
    }

    state.social_service.unfollow(current.id, target.id).await?;
    Ok(Json(Flash {
        message: state.localizer.gettext(
            locale.as_str(),
            Message::NoLongerFollowing {
                username: &username,
            },
        ),
    }))
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Json(request): Json<TranslateRequest>,
) -> Json<TranslateResponse> {
    let text = state
        .translator
        .translate(
            &request.text,
            &request.source_language,
            &request.dest_language,
            locale.as_str(),
        )
        .await;
    Json(TranslateResponse { text })
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(locale): Extension<Locale>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Page<Post>>> {
    if let Search::Disabled = state.search.as_ref() {
        return Err(AppError::Unavailable(
            state.localizer.gettext(locale.as_str(), Message::SearchDisabled),
        ));
    }

    let page = state
        .blog_service
        .search_posts(
            &query.q,
            query.page.unwrap_or(1).max(1),
            state.settings.posts_per_page,
        )
        .await?;
    Ok(Json(page))
}

pub async fn export_posts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Extension(locale): Extension<Locale>,
) -> AppResult<(StatusCode, Json<QueuedTask>)> {
    let job = state
        .task_queue
        .enqueue("export_posts", json!({ "user_id": user.id }))
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedTask {
            job_id: job.id,
            message: state.localizer.gettext(locale.as_str(), Message::ExportQueued),
        }),
    ))
}
