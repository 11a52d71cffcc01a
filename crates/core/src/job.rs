//! Job records as kept in the jobs collection, and the inbound state update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::{DomainError, DomainResult};
use crate::timestamp::Timestamp;

/// Status fragments that mark a job as finished (matched case-insensitively).
pub const TERMINAL_STATUSES: [&str; 2] = ["completed", "failed"];

/// The last status the processor observed for a job.
///
/// `Unobserved` is distinct from every real status, including the empty
/// string, so the first update seen for a job always counts as a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ObservedStatus {
    #[default]
    Unobserved,
    Observed(String),
}

impl ObservedStatus {
    pub fn is_unobserved(&self) -> bool {
        matches!(self, Self::Unobserved)
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Unobserved => None,
            Self::Observed(status) => Some(status),
        }
    }

    /// Whether `status` is a change relative to this observation.
    pub fn differs_from(&self, status: &str) -> bool {
        match self {
            Self::Unobserved => true,
            Self::Observed(previous) => previous != status,
        }
    }
}

impl Serialize for ObservedStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unobserved => serializer.serialize_none(),
            Self::Observed(status) => serializer.serialize_str(status),
        }
    }
}

impl<'de> Deserialize<'de> for ObservedStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map_or(Self::Unobserved, Self::Observed))
    }
}

/// A job as stored in the jobs collection.
///
/// Fields the relay does not model are kept in `extra` so that a full
/// overwrite never drops data written by other producers. Optional fields
/// serialize as `null` when unset, so an explicit `null` is written back as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub uuid: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "ObservedStatus::is_unobserved")]
    pub previous_status: ObservedStatus,
    pub user: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub submission_date: Option<Timestamp>,
    #[serde(default)]
    pub completion_date: Option<Timestamp>,
    pub output_dir: String,
    pub output_manifest: JsonValue,
    pub workspace_id: JsonValue,
    #[serde(default)]
    pub notify: Option<bool>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub analysis_id: Option<String>,
    #[serde(default)]
    pub analysis_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl JobRecord {
    /// Whether the current status differs from the last observed one.
    pub fn status_changed(&self) -> bool {
        self.previous_status.differs_from(&self.status)
    }

    /// Whether the status names a finished job ("Completed"/"Failed", any case).
    pub fn is_terminal(&self) -> bool {
        let status = self.status.to_lowercase();
        TERMINAL_STATUSES.iter().any(|t| status.contains(t))
    }

    pub fn has_completion_date(&self) -> bool {
        self.completion_date.as_ref().is_some_and(|ts| !ts.is_empty())
    }

    /// Stamp the completion date if the job just finished and has none yet.
    ///
    /// Returns `true` when the date was stamped.
    pub fn stamp_completion(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() && !self.has_completion_date() {
            self.completion_date = Some(Timestamp::at(now));
            true
        } else {
            false
        }
    }

    /// Record the current status as observed.
    pub fn mark_observed(&mut self) {
        self.previous_status = ObservedStatus::Observed(self.status.clone());
    }

    pub fn wants_email(&self) -> bool {
        self.notify.unwrap_or(false)
    }

    /// The notification e-mail address, ignoring blank values.
    pub fn email_address(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// Display name of the job, falling back to its uuid.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.uuid)
    }

    /// Path component of `output_dir` (the whole value if it is not a URL).
    pub fn result_folder_path(&self) -> String {
        match url::Url::parse(&self.output_dir) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self.output_dir.clone(),
        }
    }

    /// Human-readable summary of the current status.
    pub fn status_text(&self) -> String {
        format!("job {} {}", self.display_name(), self.status.to_lowercase())
    }
}

/// Inbound job-state update: a job record plus its persistent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStateUpdate {
    pub object_persistence_uuid: String,
    pub state: JobRecord,
}

impl JobStateUpdate {
    /// Parse and validate a raw update body.
    pub fn from_slice(body: &[u8]) -> DomainResult<Self> {
        let update: Self = serde_json::from_slice(body)
            .map_err(|e| DomainError::validation(format!("malformed job status update: {e}")))?;
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.object_persistence_uuid.trim().is_empty() {
            return Err(DomainError::missing_field("object_persistence_uuid"));
        }
        if self.state.uuid.trim().is_empty() {
            return Err(DomainError::missing_field("state.uuid"));
        }
        if self.state.user.trim().is_empty() {
            return Err(DomainError::missing_field("state.user"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(status: &str) -> JobRecord {
        serde_json::from_value(json!({
            "uuid": "abc-1",
            "status": status,
            "user": "ipctest",
            "output_dir": "irods://data.example.org/iplant/home/ipctest/analyses/run-1",
            "output_manifest": [],
            "workspace_id": "42",
        }))
        .unwrap()
    }

    #[test]
    fn first_observation_is_always_a_transition() {
        assert!(job("Submitted").status_changed());
        assert!(job("").status_changed());
    }

    #[test]
    fn empty_previous_status_is_an_observation() {
        let mut j = job("");
        j.previous_status = ObservedStatus::Observed(String::new());
        assert!(!j.status_changed());
    }

    #[test]
    fn repeated_status_is_not_a_transition() {
        let mut j = job("Running");
        j.mark_observed();
        assert!(!j.status_changed());
        j.status = "Completed".into();
        assert!(j.status_changed());
    }

    #[test]
    fn terminal_match_ignores_case() {
        assert!(job("COMPLETED").is_terminal());
        assert!(job("failed").is_terminal());
        assert!(!job("Running").is_terminal());
    }

    #[test]
    fn completion_is_stamped_once() {
        let now = Utc::now();
        let mut j = job("Completed");
        assert!(j.stamp_completion(now));
        assert!(j.has_completion_date());
        assert!(!j.stamp_completion(now));

        let mut running = job("Running");
        assert!(!running.stamp_completion(now));
        assert!(running.completion_date.is_none());
    }

    #[test]
    fn previous_status_round_trips() {
        let mut j = job("Running");
        let v = serde_json::to_value(&j).unwrap();
        assert!(v.get("previous_status").is_none());

        j.mark_observed();
        let v = serde_json::to_value(&j).unwrap();
        assert_eq!(v["previous_status"], "Running");

        let back: JobRecord = serde_json::from_value(json!({
            "uuid": "x", "status": "Running", "previous_status": null, "user": "u",
            "output_dir": "", "output_manifest": null, "workspace_id": 1,
        }))
        .unwrap();
        assert!(back.previous_status.is_unobserved());
    }

    #[test]
    fn explicit_nulls_survive_a_round_trip() {
        let raw = json!({
            "uuid": "abc-1", "status": "Running", "user": "u", "output_dir": "/x",
            "output_manifest": [], "workspace_id": "7",
            "name": null, "email": null, "completion_date": null,
        });
        let j: JobRecord = serde_json::from_value(raw).unwrap();
        let v = serde_json::to_value(&j).unwrap();
        for key in ["name", "email", "completion_date"] {
            assert_eq!(v.get(key), Some(&JsonValue::Null), "{key}");
        }
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "uuid": "abc-1", "status": "Running", "user": "u", "output_dir": "/x",
            "output_manifest": [], "workspace_id": "7", "output_folder_id": "f-9",
        });
        let j: JobRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(serde_json::to_value(&j).unwrap()["output_folder_id"], "f-9");
    }

    #[test]
    fn result_folder_is_the_url_path() {
        assert_eq!(
            job("Running").result_folder_path(),
            "/iplant/home/ipctest/analyses/run-1"
        );
    }

    #[test]
    fn blank_email_counts_as_absent() {
        let mut j = job("Running");
        j.email = Some("  ".into());
        assert_eq!(j.email_address(), None);
    }

    #[test]
    fn update_requires_nested_state() {
        let err = JobStateUpdate::from_slice(br#"{"object_persistence_uuid":"p-1"}"#).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = JobStateUpdate::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_requires_persistence_id() {
        let body = json!({
            "object_persistence_uuid": "",
            "state": serde_json::to_value(job("Running")).unwrap(),
        });
        let err = JobStateUpdate::from_slice(body.to_string().as_bytes()).unwrap_err();
        assert_eq!(err, DomainError::missing_field("object_persistence_uuid"));
    }
}
