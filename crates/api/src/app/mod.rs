//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store clients, pipeline, processor and services built from config
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request body parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Unknown paths and unsupported methods on known paths both answer `404`.
pub fn build_app(services: Arc<AppServices>) -> Router {
    use routes::system::not_found;

    Router::new()
        .route("/health", get(routes::system::health).fallback(not_found))
        .route("/job-status", post(routes::job_status::job_status).fallback(not_found))
        .route("/get-messages", post(routes::messages::get_messages).fallback(not_found))
        .route(
            "/get-unseen-messages",
            post(routes::messages::get_unseen_messages).fallback(not_found),
        )
        .route("/delete", post(routes::messages::delete).fallback(not_found))
        .route(
            "/save-output-folder",
            post(routes::output_folder::save_output_folder).fallback(not_found),
        )
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
