//! JSON-over-HTTP object store client.
//!
//! Wire protocol (all requests are `POST` with `Content-Type: application/json`):
//!
//! | Operation      | URL                          | Body                              |
//! |----------------|------------------------------|-----------------------------------|
//! | save           | `{base}/{collection}`        | the record                        |
//! | search         | `{base}/{collection}/query`  | the filter document               |
//! | update         | `{base}/{collection}/{id}`   | the full record                   |
//! | update field   | `{base}/{collection}/{id}`   | `{"$set": {"state.<field>": v}}`  |
//!
//! Any status other than `200 OK` is a failure. A save answers with the new id; a
//! search answers with `{"objects": [{"object_persistence_uuid", "state"}]}`.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::query::{Query, ID_FIELD};
use super::r#trait::{StoreClient, StoreError, StoreOperation, StoredObject};

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    objects: Vec<StoredObject>,
}

/// Object store client bound to one collection.
#[derive(Debug, Clone)]
pub struct HttpStoreClient {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl HttpStoreClient {
    /// `client` is expected to carry the request timeout (see
    /// [`crate::transport::build_http_client`]).
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            collection: collection.into(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.collection)
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.collection_url())
    }

    fn object_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    /// POST `body` to `url`; returns the trimmed response text of a `200 OK` answer.
    async fn post(
        &self,
        operation: StoreOperation,
        url: String,
        body: String,
    ) -> Result<String, StoreError> {
        debug!(collection = %self.collection, %operation, %url, "object store request");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .send()
            .await
            .map_err(|e| transport_error(e, operation, &url, &body))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(StoreError::Status {
                operation,
                status: status.as_u16(),
                request_body: body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, operation, &url, &body))?;
        Ok(text.trim().to_string())
    }
}

fn transport_error(err: reqwest::Error, operation: StoreOperation, url: &str, body: &str) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout {
            operation,
            url: url.to_string(),
            request_body: body.to_string(),
        }
    } else {
        StoreError::Connection {
            operation,
            url: url.to_string(),
            message: err.to_string(),
            request_body: body.to_string(),
        }
    }
}

/// Extract the assigned id from a save response.
///
/// Stores answer either with the bare id, a JSON string, or an object carrying
/// `object_persistence_uuid`.
fn assigned_id(text: &str) -> Option<String> {
    let id = match serde_json::from_str::<JsonValue>(text) {
        Ok(JsonValue::String(id)) => id,
        Ok(JsonValue::Object(obj)) => obj.get(ID_FIELD)?.as_str()?.to_string(),
        _ => text.to_string(),
    };
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn save(&self, record: &JsonValue) -> Result<String, StoreError> {
        let body = record.to_string();
        let text = self
            .post(StoreOperation::Save, self.collection_url(), body.clone())
            .await?;

        assigned_id(&text).ok_or_else(|| StoreError::Decode {
            operation: StoreOperation::Save,
            message: format!("no id in response: {text:?}"),
            request_body: body,
        })
    }

    async fn search(&self, query: &Query) -> Result<Vec<StoredObject>, StoreError> {
        let body = query.to_json().to_string();
        let text = self
            .post(StoreOperation::Search, self.query_url(), body.clone())
            .await?;

        let parsed: QueryResponse =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode {
                operation: StoreOperation::Search,
                message: e.to_string(),
                request_body: body,
            })?;
        Ok(parsed.objects)
    }

    async fn update(&self, id: &str, record: &JsonValue) -> Result<(), StoreError> {
        self.post(StoreOperation::Update, self.object_url(id), record.to_string())
            .await
            .map(drop)
    }

    async fn update_field(&self, id: &str, field: &str, value: JsonValue) -> Result<(), StoreError> {
        let mut set = serde_json::Map::new();
        set.insert(format!("state.{field}"), value);
        let body = serde_json::json!({ "$set": set });
        self.post(StoreOperation::UpdateField, self.object_url(id), body.to_string())
            .await
            .map(drop)
    }
}
