use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Extension, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::core::app::AppState;
use crate::core::error::{AppError, AppResult};
use crate::i18n::Message;
use crate::web::middleware::{request_locale, Locale};
use crate::web::templates::{NOT_FOUND, SERVER_ERROR};

/// Error pages. Owns the router-wide fallback.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().fallback(not_found)
}

fn render_page(state: &AppState, template: &str, title: Message<'_>, locale: &str) -> AppResult<String> {
    state.templates.render(
        template,
        &json!({
            "locale": locale,
            "title": state.localizer.gettext(locale, title),
            "back": state.localizer.gettext(locale, Message::Back),
            "at": Utc::now().to_rfc3339(),
        }),
    )
}

pub async fn not_found(
    State(state): State<Arc<AppState>>,
    locale: Option<Extension<Locale>>,
    uri: Uri,
) -> Response {
    if uri.path() == "/api" || uri.path().starts_with("/api/") {
        return AppError::NotFound(format!("No route for {}", uri.path())).into_response();
    }

    let locale = locale
        .map(|Extension(locale)| locale.0)
        .unwrap_or_else(|| "en".to_string());
    match render_page(&state, NOT_FOUND, Message::PageNotFound, &locale) {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Browsers get the 500 page instead of the JSON error body.
pub async fn render_html_errors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let wants_html = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false);
    let locale = request_locale(&request, &state);

    let response = next.run(request).await;
    if !wants_html || response.status() != StatusCode::INTERNAL_SERVER_ERROR {
        return response;
    }

    match render_page(&state, SERVER_ERROR, Message::InternalError, &locale) {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
        Err(_) => response,
    }
}
