//! Notification records derived from job status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::job::JobRecord;
use crate::timestamp::Timestamp;

/// Notification type used for job status changes.
pub const ANALYSIS_NOTIFICATION: &str = "analysis";

/// Payload action used for job status changes.
pub const JOB_STATUS_CHANGE: &str = "job_status_change";

/// A notification as stored in the notifications collection.
///
/// `payload.id` holds the originating job's uuid; that is the only link between
/// the two collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub seen: bool,
    #[serde(rename = "workspaceId", default, skip_serializing_if = "JsonValue::is_null")]
    pub workspace_id: JsonValue,
    #[serde(rename = "outputDir", default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(rename = "outputManifest", default, skip_serializing_if = "JsonValue::is_null")]
    pub output_manifest: JsonValue,
    pub message: NotificationMessage,
    pub payload: JobStatusPayload,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub text: String,
}

/// Snapshot of the job the notification was raised for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatusPayload {
    pub id: String,
    #[serde(default)]
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub resultfolderid: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub startdate: Timestamp,
    #[serde(default)]
    pub enddate: Timestamp,
    #[serde(default)]
    pub analysis_id: String,
    #[serde(default)]
    pub analysis_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl NotificationRecord {
    /// Build an unsaved notification from a job snapshot.
    ///
    /// Optional job fields that are absent become empty strings.
    pub fn from_job(job: &JobRecord, now: DateTime<Utc>) -> Self {
        Self {
            kind: ANALYSIS_NOTIFICATION.to_string(),
            user: job.user.clone(),
            deleted: false,
            seen: false,
            workspace_id: job.workspace_id.clone(),
            output_dir: Some(job.output_dir.clone()),
            output_manifest: job.output_manifest.clone(),
            message: NotificationMessage {
                id: String::new(),
                timestamp: Timestamp::at(now),
                text: job.status_text(),
            },
            payload: JobStatusPayload {
                id: job.uuid.clone(),
                action: JOB_STATUS_CHANGE.to_string(),
                status: job.status.clone(),
                resultfolderid: job.result_folder_path(),
                user: job.user.clone(),
                name: job.name.clone().unwrap_or_default(),
                startdate: job.submission_date.clone().unwrap_or_default(),
                enddate: job.completion_date.clone().unwrap_or_default(),
                analysis_id: job.analysis_id.clone().unwrap_or_default(),
                analysis_name: job.analysis_name.clone().unwrap_or_default(),
                description: job.description.clone().unwrap_or_default(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// The uuid of the job this notification belongs to.
    pub fn job_uuid(&self) -> &str {
        &self.payload.id
    }

    /// Convert every timestamp field to epoch milliseconds (or empty).
    pub fn normalize_timestamps(&mut self) {
        self.message.timestamp = self.message.timestamp.normalized();
        self.payload.startdate = self.payload.startdate.normalized();
        self.payload.enddate = self.payload.enddate.normalized();
    }

    /// Outbound form of a persisted notification: id stamped, timestamps numeric.
    pub fn outbound(&self, id: &str) -> Self {
        let mut out = self.clone();
        out.message.id = id.to_string();
        out.normalize_timestamps();
        out
    }
}
