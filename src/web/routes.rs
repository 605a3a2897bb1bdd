use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::app::AppState;
use crate::web::handlers::{api, auth, errors, main};
use crate::web::middleware::negotiate_locale;

/// Mounts the four route groups. Prefixes are disjoint, so order is irrelevant.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(errors::routes())
        .nest("/auth", auth::routes())
        .merge(main::routes(&state))
        .nest("/api", api::routes(&state))
        // Health check
        .route("/health", get(health_check))
        .layer(from_fn_with_state(state.clone(), errors::render_html_errors))
        .layer(from_fn_with_state(state.clone(), negotiate_locale))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
