//! Notification persistence and delivery.
//!
//! - `pipeline`: persists a batch one message at a time, then forwards each
//!   persisted message
//! - `forwarder`: best-effort delivery to the configured recipient URLs

pub mod forwarder;
pub mod pipeline;

pub use forwarder::{Delivery, DeliveryOutcome, Forwarder, HttpForwarder, RecordingForwarder};
pub use pipeline::{NotificationPipeline, PersistedNotification, PipelineError, PipelineReport};
