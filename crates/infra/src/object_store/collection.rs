//! Typed access to a store collection.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::query::Query;
use super::r#trait::{StoreClient, StoreError, StoreOperation};

/// A decoded record together with its persistent id.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    pub record: T,
}

/// A [`StoreClient`] whose records all have type `T`.
#[derive(Debug, Clone)]
pub struct Collection<S, T> {
    store: S,
    _record: PhantomData<fn() -> T>,
}

impl<S, T> Collection<S, T>
where
    S: StoreClient,
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn name(&self) -> &str {
        self.store.collection()
    }

    pub async fn save(&self, record: &T) -> Result<String, StoreError> {
        let value = encode(StoreOperation::Save, record)?;
        self.store.save(&value).await
    }

    /// Run `query`; every match must decode as `T`.
    pub async fn search(&self, query: &Query) -> Result<Vec<Stored<T>>, StoreError> {
        let objects = self.store.search(query).await?;
        objects
            .into_iter()
            .map(|object| {
                let record = object.decode::<T>().map_err(|e| StoreError::Decode {
                    operation: StoreOperation::Search,
                    message: format!("record {}: {e}", object.id),
                    request_body: query.to_json().to_string(),
                })?;
                Ok(Stored {
                    id: object.id,
                    record,
                })
            })
            .collect()
    }

    pub async fn update(&self, id: &str, record: &T) -> Result<(), StoreError> {
        let value = encode(StoreOperation::Update, record)?;
        self.store.update(id, &value).await
    }

    pub async fn update_field(
        &self,
        id: &str,
        field: &str,
        value: impl Into<JsonValue>,
    ) -> Result<(), StoreError> {
        self.store.update_field(id, field, value.into()).await
    }
}

fn encode<T: Serialize>(operation: StoreOperation, record: &T) -> Result<JsonValue, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Encode {
        operation,
        message: e.to_string(),
    })
}
