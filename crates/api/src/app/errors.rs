use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use jobrelay_core::DomainError;
use jobrelay_infra::job_status::ProcessError;
use jobrelay_infra::messages::MessageServiceError;
use jobrelay_infra::output_folder::OutputFolderError;
use jobrelay_infra::StoreError;

pub fn validation_error(err: DomainError) -> axum::response::Response {
    tracing::info!(error = %err, "rejecting invalid request");
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

pub fn store_error(err: &StoreError) -> axum::response::Response {
    tracing::error!(
        error = %err,
        request_body = %err.request_body(),
        "object store request failed"
    );
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn process_error_to_response(err: ProcessError) -> axum::response::Response {
    match err {
        ProcessError::Validation(e) => validation_error(e),
        ProcessError::Pipeline(e) => {
            tracing::error!(error = %e, "notification pipeline failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "pipeline_error", e.to_string())
        }
        ProcessError::Store { source, .. } => store_error(&source),
    }
}

pub fn message_error_to_response(err: MessageServiceError) -> axum::response::Response {
    match err {
        MessageServiceError::Validation(e) => validation_error(e),
        MessageServiceError::Store(e) => store_error(&e),
    }
}

pub fn output_folder_error_to_response(err: OutputFolderError) -> axum::response::Response {
    match err {
        OutputFolderError::Validation(e) => validation_error(e),
        OutputFolderError::Store(e) => store_error(&e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
