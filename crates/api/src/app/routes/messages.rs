use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse, Json};

use jobrelay_infra::messages::MessageQuery;

use crate::app::{
    dto::{self, MessagesResponse},
    errors,
    services::AppServices,
};

/// `POST /get-messages`
pub async fn get_messages(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let query: MessageQuery = match dto::parse_body(&body) {
        Ok(query) => query,
        Err(e) => return errors::validation_error(e),
    };
    match services.messages.get_messages(&query).await {
        Ok(messages) => Json(MessagesResponse { messages }).into_response(),
        Err(e) => errors::message_error_to_response(e),
    }
}

/// `POST /get-unseen-messages`
pub async fn get_unseen_messages(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let query: MessageQuery = match dto::parse_body(&body) {
        Ok(query) => query,
        Err(e) => return errors::validation_error(e),
    };
    match services.messages.get_unseen_messages(&query).await {
        Ok(messages) => Json(MessagesResponse { messages }).into_response(),
        Err(e) => errors::message_error_to_response(e),
    }
}

/// `POST /delete`
pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let request = match dto::parse_delete_request(&body) {
        Ok(request) => request,
        Err(e) => return errors::validation_error(e),
    };
    match services.messages.delete(&request).await {
        Ok(report) => {
            tracing::info!(
                deleted = report.deleted.len(),
                missing = report.missing.len(),
                "notifications deleted"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => errors::message_error_to_response(e),
    }
}
