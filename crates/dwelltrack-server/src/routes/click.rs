use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};

use dwelltrack_core::tracker::ClickOutcome;

use crate::{state::AppState, tracking::CurrentSession};

/// `GET /log_binary` — record a click on the call-to-action button.
///
/// Always redirects back to the variant A landing page; the click is only
/// queued, never written before the response. The visitor's page timing is not affected here;
/// the redirected request to `/` is timed like any other visit.
#[tracing::instrument(skip_all)]
pub async fn log_binary(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Response {
    if let ClickOutcome::Queued(_) = state.tracker.record_button_click(&session).await {
        tracing::debug!(session_id = %session.session_id, "Button click queued");
    }

    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static("/"));
    response
}
