use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse};

use jobrelay_core::JobStateUpdate;
use jobrelay_infra::job_status::ProcessOutcome;

use crate::app::{errors, services::AppServices};

/// `POST /job-status`: handle one job-state update.
///
/// Answers `200` with an empty body both for a handled transition and for an
/// update that changed nothing.
pub async fn job_status(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let update = match JobStateUpdate::from_slice(&body) {
        Ok(update) => update,
        Err(e) => return errors::validation_error(e),
    };
    let job = update.state.uuid.clone();

    match services.processor.process(update).await {
        Ok(ProcessOutcome::Unchanged) => StatusCode::OK.into_response(),
        Ok(ProcessOutcome::Transitioned { notification_id, record }) => {
            tracing::info!(
                job = %job,
                notification = %notification_id,
                status = %record.status,
                "job status update handled"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => errors::process_error_to_response(e),
    }
}
