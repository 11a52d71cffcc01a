//! `jobrelay-core` — domain records for job-status relaying.
//!
//! This crate contains **pure domain** types (no IO): the job and notification
//! records kept in the object store, the inbound job-state update, and the
//! timestamp handling shared by every outbound message.

pub mod error;
pub mod job;
pub mod notification;
pub mod timestamp;

pub use error::{DomainError, DomainResult};
pub use job::{JobRecord, JobStateUpdate, ObservedStatus};
pub use notification::{JobStatusPayload, NotificationMessage, NotificationRecord};
pub use timestamp::Timestamp;
