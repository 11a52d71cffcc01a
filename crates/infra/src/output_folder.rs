//! Recording the result folder id on job records.

use jobrelay_core::DomainError;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use crate::object_store::{Query, StoreClient, StoreError};

/// Job field that holds the result folder id.
pub const OUTPUT_FOLDER_FIELD: &str = "output_folder_id";

#[derive(Debug, Error)]
pub enum OutputFolderError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request to attach a folder id to every record of a job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputFolderRequest {
    #[serde(default)]
    pub uuid: JsonValue,
    #[serde(default, rename = "folderId")]
    pub folder_id: JsonValue,
}

impl OutputFolderRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.uuid.is_null() {
            return Err(DomainError::missing_field("uuid"));
        }
        if self.folder_id.is_null() {
            return Err(DomainError::missing_field("folderId"));
        }
        Ok(())
    }
}

pub struct OutputFolderService<S> {
    jobs: S,
}

impl<S: StoreClient> OutputFolderService<S> {
    pub fn new(jobs: S) -> Self {
        Self { jobs }
    }

    /// Store the folder id on each job matching `uuid`, one at a time.
    ///
    /// Returns the number of job records updated. The first store failure
    /// aborts; records before it keep the new folder id.
    pub async fn save_output_folder(
        &self,
        request: &OutputFolderRequest,
    ) -> Result<usize, OutputFolderError> {
        request.validate()?;

        let matches = self
            .jobs
            .search(&Query::new().eq("uuid", request.uuid.clone()))
            .await?;
        debug!(job = %request.uuid, matches = matches.len(), "storing output folder id");

        let mut updated = 0;
        for mut object in matches {
            if let Some(state) = object.state.as_object_mut() {
                state.insert(OUTPUT_FOLDER_FIELD.to_string(), request.folder_id.clone());
            }
            self.jobs.update(&object.id, &object.state).await?;
            updated += 1;
        }

        info!(job = %request.uuid, updated, "output folder id stored");
        Ok(updated)
    }
}
