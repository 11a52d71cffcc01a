use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse};

use jobrelay_infra::output_folder::OutputFolderRequest;

use crate::app::{dto, errors, services::AppServices};

/// `POST /save-output-folder`
pub async fn save_output_folder(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let request: OutputFolderRequest = match dto::parse_body(&body) {
        Ok(request) => request,
        Err(e) => return errors::validation_error(e),
    };
    match services.output_folders.save_output_folder(&request).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => errors::output_folder_error_to_response(e),
    }
}
