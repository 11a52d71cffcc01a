//! Job status transition handling.
//!
//! An inbound job-state update counts as a transition when its status differs
//! from the last status this processor observed for the job. A transition
//! produces one notification and one write-back of the job record; anything
//! else produces no side effects at all.

use chrono::{DateTime, Utc};
use jobrelay_core::{DomainError, JobRecord, JobStateUpdate, NotificationRecord};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::email::{EmailDispatcher, EmailNotification};
use crate::notifications::{Forwarder, NotificationPipeline, PipelineError};
use crate::object_store::{Collection, StoreClient, StoreError};

/// E-mail settings for the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EmailPolicy {
    #[default]
    Disabled,
    Enabled { template: String },
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("notification not stored: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("job {job} not written back: {source}")]
    Store { job: String, source: StoreError },
}

/// What the processor did with an update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Status matched the last observed one; nothing was written.
    Unchanged,
    /// A notification was stored and the job written back.
    Transitioned {
        notification_id: String,
        record: JobRecord,
    },
}

pub struct JobStatusProcessor<J, N, F, E> {
    jobs: Collection<J, JobRecord>,
    pipeline: NotificationPipeline<N, F>,
    mailer: E,
    email: EmailPolicy,
}

impl<J, N, F, E> JobStatusProcessor<J, N, F, E>
where
    J: StoreClient,
    N: StoreClient,
    F: Forwarder,
    E: EmailDispatcher,
{
    pub fn new(jobs: J, pipeline: NotificationPipeline<N, F>, mailer: E, email: EmailPolicy) -> Self {
        Self {
            jobs: Collection::new(jobs),
            pipeline,
            mailer,
            email,
        }
    }

    pub async fn process(&self, update: JobStateUpdate) -> Result<ProcessOutcome, ProcessError> {
        self.process_at(update, Utc::now()).await
    }

    /// [`process`](Self::process) with an explicit clock.
    pub async fn process_at(
        &self,
        update: JobStateUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, ProcessError> {
        update.validate()?;
        let JobStateUpdate {
            object_persistence_uuid: id,
            state: mut job,
        } = update;

        if !job.status_changed() {
            debug!(job = %job.uuid, status = %job.status, "status unchanged");
            return Ok(ProcessOutcome::Unchanged);
        }
        info!(
            job = %job.uuid,
            from = ?job.previous_status.as_deref(),
            to = %job.status,
            "job status changed"
        );

        if job.stamp_completion(now) {
            debug!(job = %job.uuid, "completion date stamped");
        }

        self.send_email(&job);

        let report = self
            .pipeline
            .submit(vec![NotificationRecord::from_job(&job, now)])
            .await?;
        let notification_id = report
            .persisted
            .into_iter()
            .next()
            .map(|p| p.id)
            .unwrap_or_default();

        job.mark_observed();
        if let Err(source) = self.jobs.update(&id, &job).await {
            error!(
                job = %job.uuid,
                request_body = %source.request_body(),
                error = %source,
                "unable to write back job state"
            );
            return Err(ProcessError::Store {
                job: job.uuid.clone(),
                source,
            });
        }

        Ok(ProcessOutcome::Transitioned {
            notification_id,
            record: job,
        })
    }

    fn send_email(&self, job: &JobRecord) {
        let EmailPolicy::Enabled { template } = &self.email else {
            return;
        };
        if !job.wants_email() {
            return;
        }
        match EmailNotification::for_job(job, template) {
            Some(email) => self.mailer.dispatch(email),
            None => debug!(job = %job.uuid, "no e-mail address; skipping e-mail"),
        }
    }
}
