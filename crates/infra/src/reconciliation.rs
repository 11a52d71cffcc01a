//! Startup repair of notifications left stale by an interrupted transition.
//!
//! A transition stores its notification before writing the job back. If the
//! process dies in between, the notification can be left tagged "Running"
//! while the job has moved on. The sweep treats the jobs collection as the
//! source of truth and corrects `payload.status` on such notifications. It
//! never writes jobs and never creates notifications.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::object_store::{Query, StoreClient, StoreError, StoredObject};

/// Status of notifications the sweep inspects.
pub const RUNNING_STATUS: &str = "Running";

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unable to list running notifications: {0}")]
    Notifications(#[source] StoreError),

    #[error("unable to look up jobs: {0}")]
    Jobs(#[source] StoreError),
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Notifications found tagged "Running".
    pub candidates: usize,
    /// Jobs returned by the lookup.
    pub jobs_found: usize,
    /// Notifications whose status was rewritten.
    pub corrected: usize,
    /// Notifications already matching their job.
    pub consistent: usize,
    /// Corrections the store rejected.
    pub failed: usize,
    /// Records lacking the id or status needed to pair them.
    pub skipped: usize,
}

/// The only job fields the sweep reads.
#[derive(Debug, Deserialize)]
struct JobKey {
    uuid: String,
    status: String,
}

/// The only notification fields the sweep reads, taken from `payload`.
#[derive(Debug, Deserialize)]
struct PayloadKey {
    id: String,
    status: String,
}

struct Candidate {
    id: String,
    status: String,
    state: JsonValue,
}

/// One-shot consistency pass between the jobs and notifications collections.
///
/// Records are handled as raw JSON: a correction rewrites `payload.status`
/// and leaves every other field of the stored notification as it was.
pub struct ReconciliationSweep<J, N> {
    jobs: J,
    notifications: N,
    batch_size: usize,
}

impl<J, N> ReconciliationSweep<J, N>
where
    J: StoreClient,
    N: StoreClient,
{
    /// `batch_size` bounds the number of ids per jobs lookup (minimum 1).
    pub fn new(jobs: J, notifications: N, batch_size: usize) -> Self {
        Self {
            jobs,
            notifications,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::default();

        let running = self
            .notifications
            .search(&Query::new().eq("payload.status", RUNNING_STATUS))
            .await
            .map_err(SweepError::Notifications)?;

        let mut index = index_by_job(running, &mut report);
        report.candidates = index.values().map(Vec::len).sum();
        if index.is_empty() {
            info!(skipped = report.skipped, "no running notifications; nothing to reconcile");
            return Ok(report);
        }

        let mut job_ids: Vec<String> = index.keys().cloned().collect();
        job_ids.sort();
        debug!(jobs = job_ids.len(), notifications = report.candidates, "looking up jobs");

        for chunk in job_ids.chunks(self.batch_size) {
            let jobs = self
                .jobs
                .search(&Query::new().one_of("uuid", chunk.iter().map(String::as_str)))
                .await
                .map_err(SweepError::Jobs)?;

            for object in jobs {
                let job: JobKey = match object.decode() {
                    Ok(job) => job,
                    Err(e) => {
                        warn!(id = %object.id, error = %e, "job has no usable uuid or status; skipping");
                        report.skipped += 1;
                        continue;
                    }
                };
                report.jobs_found += 1;

                let Some(candidates) = index.remove(&job.uuid) else {
                    debug!(job = %job.uuid, "job has no running notification; skipping");
                    continue;
                };
                for candidate in candidates {
                    self.reconcile(&job, candidate, &mut report).await;
                }
            }
        }

        info!(
            candidates = report.candidates,
            corrected = report.corrected,
            consistent = report.consistent,
            failed = report.failed,
            skipped = report.skipped,
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile(&self, job: &JobKey, candidate: Candidate, report: &mut SweepReport) {
        let Candidate { id, status, mut state } = candidate;
        if status == job.status {
            report.consistent += 1;
            return;
        }

        info!(
            job = %job.uuid,
            notification = %id,
            from = %status,
            to = %job.status,
            "correcting stale notification"
        );
        state["payload"]["status"] = JsonValue::String(job.status.clone());

        match self.notifications.update(&id, &state).await {
            Ok(()) => report.corrected += 1,
            Err(e) => {
                warn!(
                    notification = %id,
                    request_body = %e.request_body(),
                    error = %e,
                    "unable to correct notification"
                );
                report.failed += 1;
            }
        }
    }
}

/// Group running notifications by the job they belong to.
///
/// Records whose payload lacks a string `id` or `status` are counted as skipped.
fn index_by_job(
    objects: Vec<StoredObject>,
    report: &mut SweepReport,
) -> HashMap<String, Vec<Candidate>> {
    let mut index: HashMap<String, Vec<Candidate>> = HashMap::new();
    for object in objects {
        let key = object
            .state
            .get("payload")
            .filter(|payload| !payload.is_null())
            .map(|payload| match payload {
                JsonValue::Object(_) => PayloadKey::deserialize(payload),
                other => Err(serde::de::Error::custom(format!("payload is not an object: {other}"))),
            })
            .transpose();
        match key {
            Ok(Some(PayloadKey { id, status })) => index.entry(id).or_default().push(Candidate {
                id: object.id,
                status,
                state: object.state,
            }),
            Ok(None) => {
                debug!(notification = %object.id, "notification has no payload; skipping");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(
                    notification = %object.id,
                    error = %e,
                    "notification payload has no usable id or status; skipping"
                );
                report.skipped += 1;
            }
        }
    }
    index
}
