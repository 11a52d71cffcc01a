use jobrelay_core::NotificationRecord;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::object_store::{Collection, StoreClient, StoreError};

use super::forwarder::{Delivery, Forwarder};

/// A notification that was persisted, and what happened when it was forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedNotification {
    pub id: String,
    pub deliveries: Vec<Delivery>,
}

/// Result of a batch in which every message was persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub persisted: Vec<PersistedNotification>,
}

impl PipelineReport {
    pub fn ids(&self) -> Vec<&str> {
        self.persisted.iter().map(|p| p.id.as_str()).collect()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Message `index` could not be stored; `abandoned` messages after it were
    /// never attempted. Messages before it stay persisted (and forwarded).
    #[error("unable to store notification {index} ({abandoned} not attempted): {source}")]
    Persist {
        index: usize,
        abandoned: usize,
        persisted: Vec<String>,
        source: StoreError,
    },
}

impl PipelineError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            PipelineError::Persist { source, .. } => source,
        }
    }
}

/// Persist-then-forward pipeline for notification batches.
///
/// Messages are handled strictly in order: message `k + 1` is not saved until
/// the save of message `k` has completed. The first failed save aborts the
/// batch. Forwarding never affects the outcome.
#[derive(Debug, Clone)]
pub struct NotificationPipeline<S, F> {
    notifications: Collection<S, NotificationRecord>,
    forwarder: F,
}

impl<S, F> NotificationPipeline<S, F>
where
    S: StoreClient,
    F: Forwarder,
{
    pub fn new(notifications: S, forwarder: F) -> Self {
        Self {
            notifications: Collection::new(notifications),
            forwarder,
        }
    }

    pub async fn submit(
        &self,
        messages: Vec<NotificationRecord>,
    ) -> Result<PipelineReport, PipelineError> {
        let total = messages.len();
        debug!(count = total, "submitting notification batch");

        let mut persisted = Vec::with_capacity(total);
        for (index, message) in messages.into_iter().enumerate() {
            let id = match self.notifications.save(&message).await {
                Ok(id) => id,
                Err(source) => {
                    let abandoned = total - index - 1;
                    error!(
                        index,
                        abandoned,
                        job = %message.job_uuid(),
                        request_body = %source.request_body(),
                        error = %source,
                        "unable to store notification"
                    );
                    return Err(PipelineError::Persist {
                        index,
                        abandoned,
                        persisted: persisted.into_iter().map(|p: PersistedNotification| p.id).collect(),
                        source,
                    });
                }
            };
            debug!(index, notification = %id, job = %message.job_uuid(), "notification stored");

            let deliveries = match serde_json::to_string(&message.outbound(&id)) {
                Ok(body) => self.forwarder.forward(&body).await,
                Err(e) => {
                    warn!(notification = %id, error = %e, "unable to encode notification for forwarding");
                    Vec::new()
                }
            };
            persisted.push(PersistedNotification { id, deliveries });
        }

        info!(count = total, "notification batch finished");
        Ok(PipelineReport { persisted })
    }
}
