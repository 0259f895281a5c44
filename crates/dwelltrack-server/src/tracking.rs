//! The boundary hook wrapped around every page and click request.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use rand::RngCore;
use tracing::{debug, warn};

use dwelltrack_core::session::VisitorSession;
use dwelltrack_core::tracker::{BoundaryOutcome, IntervalClose};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "dt_session";

/// Session ids are 16 random bytes, hex encoded.
const SESSION_ID_BYTES: usize = 16;

/// Read-only copy of the caller's session as it stood when the request
/// arrived. Inserted into request extensions for handlers.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub VisitorSession);

/// Resolve the session, run the handler, then advance the session's timing
/// state for the requested path.
///
/// The session lock is taken on arrival and held until tracking is done, so
/// requests from one browser are evaluated strictly in arrival order. Closed
/// intervals are only queued; the store is never awaited here. The
/// handler's response is returned as-is; new sessions only gain a
/// `Set-Cookie` header.
pub async fn track_visit(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session_id, is_new) = match session_id_from_headers(request.headers()) {
        Some(id) => (id, false),
        None => (new_session_id(), true),
    };
    let requested_path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mut session = state.sessions.lock_session(&session_id, Utc::now()).await;
    request
        .extensions_mut()
        .insert(CurrentSession(session.clone()));

    let mut response = next.run(request).await;

    let outcome = state
        .tracker
        .on_request_boundary(&mut session, &requested_path, Utc::now())
        .await;
    drop(session);
    log_outcome(&session_id, &outcome);

    if is_new {
        match HeaderValue::from_str(&build_session_cookie(&session_id, state.config.https)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Could not encode session cookie"),
        }
    }

    response
}

fn log_outcome(session_id: &str, outcome: &BoundaryOutcome) {
    match outcome {
        BoundaryOutcome::Untracked => {}
        BoundaryOutcome::Tracked { page, closed } => match closed {
            IntervalClose::Queued(record) => debug!(
                session_id,
                entered = %page,
                left = %record.page,
                dwell_seconds = record.dwell_seconds,
                "Page view queued"
            ),
            IntervalClose::NoOpenInterval => debug!(session_id, entered = %page, "Interval opened"),
            IntervalClose::BelowThreshold(_) | IntervalClose::Anonymous => {
                debug!(session_id, entered = %page, "Closed interval not recorded")
            }
        },
    }
}

/// Pull a well-formed session id out of the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookie_str| cookie_str.split(';'))
        .find_map(|c| c.trim().strip_prefix("dt_session="))
        .filter(|id| is_valid_session_id(id))
        .map(str::to_string)
}

fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_BYTES * 2 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Generate a random session id.
pub fn new_session_id() -> String {
    let mut buf = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Browser-session cookie: no `Max-Age`, so it ends when the browser closes.
/// `SameSite=Lax` keeps the cookie on top-level arrivals from survey links.
fn build_session_cookie(session_id: &str, https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/{}",
        SESSION_COOKIE, session_id, secure,
    )
}
