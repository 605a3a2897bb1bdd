use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use percent_encoding::{utf8_percent_encode, CONTROLS};
use std::sync::Arc;
use tracing::warn;

use crate::core::app::AppState;
use crate::core::error::AppError;
use crate::core::types::User;
use crate::i18n::{parse_accept_language, select_locale};

pub const LOGIN_MESSAGE_HEADER: &str = "x-login-message";

/// Locale negotiated for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn negotiate_locale(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let accepted = parse_accept_language(header);
    let locale = select_locale(&accepted, &state.settings.languages).to_string();

    request.extensions_mut().insert(Locale(locale));
    next.run(request).await
}

pub fn request_locale(request: &Request, state: &AppState) -> String {
    request
        .extensions()
        .get::<Locale>()
        .map(|locale| locale.0.clone())
        .or_else(|| state.settings.languages.first().cloned())
        .unwrap_or_else(|| "en".to_string())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = bearer_token(headers)?;
    let user = state.auth_service.validate_session(token).await.ok()?;
    if let Err(e) = state.auth_service.touch(user.id).await {
        warn!(user_id = user.id, "Could not record last seen: {}", e);
    }
    Some(user)
}

/// Page routes: anonymous visitors are redirected to the login view.
pub async fn login_required(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = authenticate(&state, request.headers()).await {
        request.extensions_mut().insert(user);
        return next.run(request).await;
    }

    let locale = request_locale(&request, &state);
    let next_path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = state.login_manager.redirect_target(next_path);
    let message = state
        .localizer
        .gettext(&locale, state.login_manager.login_message);

    let mut response = Redirect::to(&target).into_response();
    let encoded = utf8_percent_encode(&message, CONTROLS).to_string();
    if let Ok(value) = HeaderValue::from_str(&encoded) {
        response.headers_mut().insert(LOGIN_MESSAGE_HEADER, value);
    }
    response
}

/// API routes: anonymous callers get a 401 instead of a redirect.
pub async fn token_required(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => AppError::Auth("Missing or invalid bearer token".to_string()).into_response(),
    }
}
