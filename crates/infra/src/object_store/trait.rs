use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::query::Query;

/// A record returned by a query, together with its persistent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    #[serde(rename = "object_persistence_uuid")]
    pub id: String,
    pub state: JsonValue,
}

impl StoredObject {
    pub fn new(id: impl Into<String>, state: JsonValue) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    /// Decode the record into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.state)
    }
}

/// The four operations a store client performs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Save,
    Search,
    Update,
    UpdateField,
}

impl core::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            StoreOperation::Save => "save",
            StoreOperation::Search => "query",
            StoreOperation::Update => "update",
            StoreOperation::UpdateField => "field update",
        })
    }
}

/// Object store operation error.
///
/// Every variant that reached the wire carries the original request body so
/// callers can log exactly what was not stored.
///
/// ## Error Categories
///
/// - **Connection**: the store could not be reached
/// - **Timeout**: the store did not answer within the configured request timeout
/// - **Status**: the store answered with any status other than `200 OK`
/// - **Decode**: the store answered `200 OK` but the body was not what the protocol promises
/// - **Encode**: the record could not be serialized (nothing was sent)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unable to connect to object store at {url}: {message}")]
    Connection {
        operation: StoreOperation,
        url: String,
        message: String,
        request_body: String,
    },

    #[error("{operation} request to {url} timed out")]
    Timeout {
        operation: StoreOperation,
        url: String,
        request_body: String,
    },

    #[error("{operation} failed: {status}")]
    Status {
        operation: StoreOperation,
        status: u16,
        request_body: String,
    },

    #[error("malformed {operation} response: {message}")]
    Decode {
        operation: StoreOperation,
        message: String,
        request_body: String,
    },

    #[error("unable to encode record for {operation}: {message}")]
    Encode {
        operation: StoreOperation,
        message: String,
    },
}

impl StoreError {
    pub fn operation(&self) -> StoreOperation {
        match self {
            StoreError::Connection { operation, .. }
            | StoreError::Timeout { operation, .. }
            | StoreError::Status { operation, .. }
            | StoreError::Decode { operation, .. }
            | StoreError::Encode { operation, .. } => *operation,
        }
    }

    /// The body of the request that failed (empty if nothing was sent).
    pub fn request_body(&self) -> &str {
        match self {
            StoreError::Connection { request_body, .. }
            | StoreError::Timeout { request_body, .. }
            | StoreError::Status { request_body, .. }
            | StoreError::Decode { request_body, .. } => request_body,
            StoreError::Encode { .. } => "",
        }
    }
}

/// Asynchronous client bound to one collection of the object store.
///
/// Each call resolves exactly once, to either the parsed response or a
/// [`StoreError`]. Implementations never retry; retry policy belongs to the
/// deployment.
///
/// ## Operations
///
/// - `save`: create a record, returning the id the store assigned
/// - `search`: run a filter document, returning matches with their ids
/// - `update`: overwrite the record at `id` with a full new record
/// - `update_field`: set a single (possibly nested) field of the record at `id`
///   without rewriting the rest
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Name of the collection this client is bound to.
    fn collection(&self) -> &str;

    async fn save(&self, record: &JsonValue) -> Result<String, StoreError>;

    async fn search(&self, query: &Query) -> Result<Vec<StoredObject>, StoreError>;

    async fn update(&self, id: &str, record: &JsonValue) -> Result<(), StoreError>;

    async fn update_field(&self, id: &str, field: &str, value: JsonValue) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> StoreClient for Arc<S>
where
    S: StoreClient + ?Sized,
{
    fn collection(&self) -> &str {
        (**self).collection()
    }

    async fn save(&self, record: &JsonValue) -> Result<String, StoreError> {
        (**self).save(record).await
    }

    async fn search(&self, query: &Query) -> Result<Vec<StoredObject>, StoreError> {
        (**self).search(query).await
    }

    async fn update(&self, id: &str, record: &JsonValue) -> Result<(), StoreError> {
        (**self).update(id, record).await
    }

    async fn update_field(&self, id: &str, field: &str, value: JsonValue) -> Result<(), StoreError> {
        (**self).update_field(id, field, value).await
    }
}
