use axum::http::{Method, StatusCode, Uri};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Fallback for every unrouted method/path pair.
pub async fn not_found(method: Method, uri: Uri) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("no {method} service found for {}", uri.path()),
    )
}
