use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use super::query::Query;
use super::r#trait::{StoreClient, StoreError, StoreOperation, StoredObject};

/// Number of calls made per operation, failed ones included.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StoreCalls {
    pub saves: usize,
    pub searches: usize,
    pub updates: usize,
    pub field_updates: usize,
}

/// In-memory object store collection.
///
/// Intended for tests/dev. Records are kept in insertion order; ids are
/// UUIDv7. Failures can be injected per operation; an injected failure is
/// reported as a `503` status error carrying the request body.
#[derive(Debug)]
pub struct InMemoryStoreClient {
    collection: String,
    objects: RwLock<Vec<StoredObject>>,
    saves: AtomicUsize,
    searches: AtomicUsize,
    updates: AtomicUsize,
    field_updates: AtomicUsize,
    saves_before_failure: AtomicUsize,
    fail_searches: AtomicBool,
    fail_updates: AtomicBool,
    fail_field_updates: AtomicBool,
}

const INJECTED_FAILURE_STATUS: u16 = 503;

impl InMemoryStoreClient {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            objects: RwLock::new(Vec::new()),
            saves: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            field_updates: AtomicUsize::new(0),
            saves_before_failure: AtomicUsize::new(usize::MAX),
            fail_searches: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_field_updates: AtomicBool::new(false),
        }
    }

    /// Seed a record directly (not counted as a call).
    pub fn insert(&self, id: impl Into<String>, state: JsonValue) {
        if let Ok(mut objects) = self.objects.write() {
            objects.push(StoredObject::new(id, state));
        }
    }

    pub fn get(&self, id: &str) -> Option<JsonValue> {
        let objects = self.objects.read().ok()?;
        objects.iter().find(|o| o.id == id).map(|o| o.state.clone())
    }

    /// Snapshot of every record, in insertion order.
    pub fn all(&self) -> Vec<StoredObject> {
        self.objects.read().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            saves: self.saves.load(Ordering::SeqCst),
            searches: self.searches.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
            field_updates: self.field_updates.load(Ordering::SeqCst),
        }
    }

    /// Let the next `n` saves succeed and fail every save after them.
    pub fn fail_saves_after(&self, n: usize) {
        let already = self.saves.load(Ordering::SeqCst);
        self.saves_before_failure
            .store(already.saturating_add(n), Ordering::SeqCst);
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_field_updates(&self, fail: bool) {
        self.fail_field_updates.store(fail, Ordering::SeqCst);
    }

    fn injected(operation: StoreOperation, request_body: String) -> StoreError {
        StoreError::Status {
            operation,
            status: INJECTED_FAILURE_STATUS,
            request_body,
        }
    }

    fn poisoned(&self, operation: StoreOperation, request_body: String) -> StoreError {
        StoreError::Connection {
            operation,
            url: format!("memory://{}", self.collection),
            message: "lock poisoned".to_string(),
            request_body,
        }
    }

    fn not_found(operation: StoreOperation, request_body: String) -> StoreError {
        StoreError::Status {
            operation,
            status: 404,
            request_body,
        }
    }
}

/// Set `path` (dotted) inside `doc`, creating intermediate objects.
fn set_path(doc: &mut JsonValue, path: &str, value: JsonValue) {
    if !doc.is_object() {
        *doc = JsonValue::Object(Map::new());
    }
    let JsonValue::Object(obj) = doc else {
        return;
    };
    match path.split_once('.') {
        None => {
            obj.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = obj.entry(head.to_string()).or_insert(JsonValue::Null);
            set_path(child, rest, value);
        }
    }
}

#[async_trait]
impl StoreClient for InMemoryStoreClient {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn save(&self, record: &JsonValue) -> Result<String, StoreError> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.saves_before_failure.load(Ordering::SeqCst) {
            return Err(Self::injected(StoreOperation::Save, record.to_string()));
        }

        let id = uuid::Uuid::now_v7().to_string();
        let mut objects = self
            .objects
            .write()
            .map_err(|_| self.poisoned(StoreOperation::Save, record.to_string()))?;
        objects.push(StoredObject::new(id.clone(), record.clone()));
        Ok(id)
    }

    async fn search(&self, query: &Query) -> Result<Vec<StoredObject>, StoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let body = query.to_json().to_string();
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(Self::injected(StoreOperation::Search, body));
        }

        let objects = self
            .objects
            .read()
            .map_err(|_| self.poisoned(StoreOperation::Search, body))?;
        Ok(objects
            .iter()
            .filter(|o| query.matches(&o.id, &o.state))
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, record: &JsonValue) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::injected(StoreOperation::Update, record.to_string()));
        }

        let mut objects = self
            .objects
            .write()
            .map_err(|_| self.poisoned(StoreOperation::Update, record.to_string()))?;
        let object = objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| Self::not_found(StoreOperation::Update, record.to_string()))?;
        object.state = record.clone();
        Ok(())
    }

    async fn update_field(&self, id: &str, field: &str, value: JsonValue) -> Result<(), StoreError> {
        self.field_updates.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::json!({ "field": field, "value": value.clone() }).to_string();
        if self.fail_field_updates.load(Ordering::SeqCst) {
            return Err(Self::injected(StoreOperation::UpdateField, body));
        }

        let mut objects = self
            .objects
            .write()
            .map_err(|_| self.poisoned(StoreOperation::UpdateField, body.clone()))?;
        let object = objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| Self::not_found(StoreOperation::UpdateField, body))?;
        set_path(&mut object.state, field, value);
        Ok(())
    }
}
