use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{routes, state::AppState, tracking};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware, outermost first:
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `track_visit` — the boundary hook, attached with `route_layer` so it
///    only wraps the landing pages and the click endpoint. `/health` and
///    unmatched paths never create a visitor session.
pub fn build_app(state: Arc<AppState>) -> Router {
    let tracked = Router::new()
        .route("/", get(routes::pages::index))
        .route("/learn_more", get(routes::pages::learn_more))
        .route("/confirmation", get(routes::pages::confirmation))
        .route("/website_b", get(routes::pages::website_b))
        .route("/learn_more_b", get(routes::pages::learn_more_b))
        .route("/confirmation_b", get(routes::pages::confirmation_b))
        .route("/log_binary", get(routes::click::log_binary))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            tracking::track_visit,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(tracked)
        .fallback(routes::fallback::not_found)
        .method_not_allowed_fallback(routes::fallback::method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
