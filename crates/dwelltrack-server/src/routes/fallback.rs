use axum::http::Uri;

use crate::error::AppError;

/// Any path without a route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no page at {}", uri.path()))
}

/// A known path hit with the wrong HTTP method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
