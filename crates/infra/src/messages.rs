//! Notification reads and deletions on behalf of a user.

use jobrelay_core::{DomainError, NotificationRecord};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::object_store::{Query, StoreClient, StoreError, StoredObject};

#[derive(Debug, Error)]
pub enum MessageServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Message lookup request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub user: String,
    /// Only messages with this seen flag; all messages when absent.
    #[serde(default)]
    pub seen: Option<bool>,
    /// Keep only the most recent `limit` messages; all when absent or unparsable.
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<usize>,
}

impl MessageQuery {
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    fn to_query(&self) -> Query {
        let query = Query::new().eq("user", self.user.as_str()).eq("deleted", false);
        match self.seen {
            Some(seen) => query.eq("seen", seen),
            None => query,
        }
    }
}

/// Accepts a number or a numeric string; anything else means "no limit".
/// Negative limits select nothing.
fn lenient_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    let parsed = match raw {
        Some(JsonValue::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(JsonValue::String(s)) => leading_integer(&s),
        _ => None,
    };
    Ok(parsed.map(|n| usize::try_from(n).unwrap_or(0)))
}

fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().ok()
}

/// Notification deletion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteRequest {
    pub uuids: Vec<String>,
}

/// Result of a deletion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub already_deleted: Vec<String>,
}

/// Reads and deletes notifications in the notifications collection.
pub struct MessageService<S> {
    notifications: S,
}

impl<S: StoreClient> MessageService<S> {
    pub fn new(notifications: S) -> Self {
        Self { notifications }
    }

    /// Messages for a user, oldest first.
    ///
    /// Returned unseen messages are marked seen in the store. Outbound
    /// messages carry their persistent id in `message.id`, numeric
    /// timestamps and no `seen` flag.
    pub async fn get_messages(
        &self,
        query: &MessageQuery,
    ) -> Result<Vec<JsonValue>, MessageServiceError> {
        if query.user.trim().is_empty() {
            return Err(DomainError::missing_field("user").into());
        }
        debug!(user = %query.user, seen = ?query.seen, limit = ?query.limit, "querying messages");

        let objects = self.notifications.search(&query.to_query()).await?;
        let mut records: Vec<(String, NotificationRecord)> = objects
            .into_iter()
            .filter_map(decode)
            .collect();
        records.sort_by_key(|(_, record)| record.message.timestamp.as_millis());

        let start = query
            .limit
            .map_or(0, |limit| records.len().saturating_sub(limit));
        let mut messages = Vec::with_capacity(records.len() - start);
        for (id, record) in records.into_iter().skip(start) {
            if !record.seen {
                self.mark_seen(&id).await;
            }
            let mut value = match serde_json::to_value(record.outbound(&id)) {
                Ok(value) => value,
                Err(e) => {
                    warn!(notification = %id, error = %e, "unable to encode message");
                    continue;
                }
            };
            if let Some(obj) = value.as_object_mut() {
                obj.remove("seen");
            }
            messages.push(value);
        }
        Ok(messages)
    }

    /// [`get_messages`](Self::get_messages) restricted to unseen messages.
    pub async fn get_unseen_messages(
        &self,
        query: &MessageQuery,
    ) -> Result<Vec<JsonValue>, MessageServiceError> {
        let query = MessageQuery {
            seen: Some(false),
            ..query.clone()
        };
        self.get_messages(&query).await
    }

    async fn mark_seen(&self, id: &str) {
        debug!(notification = %id, "marking message as seen");
        if let Err(e) = self
            .notifications
            .update_field(id, "seen", JsonValue::Bool(true))
            .await
        {
            warn!(notification = %id, error = %e, "unable to mark message as seen");
        }
    }

    /// Mark notifications deleted, one id at a time, in request order.
    ///
    /// Unknown ids are skipped. The first store failure aborts the request;
    /// ids before it stay deleted.
    pub async fn delete(&self, request: &DeleteRequest) -> Result<DeletionReport, MessageServiceError> {
        let mut report = DeletionReport::default();
        for uuid in &request.uuids {
            let found = self.notifications.search(&Query::by_id(uuid.as_str())).await?;
            let Some(StoredObject { mut state, .. }) = found.into_iter().next() else {
                info!(notification = %uuid, "attempt to delete non-existent message ignored");
                report.missing.push(uuid.clone());
                continue;
            };

            if state.get("deleted").and_then(JsonValue::as_bool).unwrap_or(false) {
                report.already_deleted.push(uuid.clone());
                continue;
            }
            if let Some(obj) = state.as_object_mut() {
                obj.insert("deleted".to_string(), JsonValue::Bool(true));
            }
            self.notifications.update(uuid, &state).await?;
            debug!(notification = %uuid, "notification marked deleted");
            report.deleted.push(uuid.clone());
        }
        Ok(report)
    }
}

fn decode(object: StoredObject) -> Option<(String, NotificationRecord)> {
    match object.decode::<NotificationRecord>() {
        Ok(record) => Some((object.id, record)),
        Err(e) => {
            warn!(notification = %object.id, error = %e, "skipping undecodable notification");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::object_store::InMemoryStoreClient;

    fn note(user: &str, timestamp: JsonValue, seen: bool, deleted: bool) -> JsonValue {
        json!({
            "type": "analysis",
            "user": user,
            "deleted": deleted,
            "seen": seen,
            "message": { "id": "", "timestamp": timestamp, "text": "job wc completed" },
            "payload": { "id": "abc-1", "status": "Completed", "startdate": "", "enddate": "" },
        })
    }

    fn service() -> (Arc<InMemoryStoreClient>, MessageService<Arc<InMemoryStoreClient>>) {
        let store = Arc::new(InMemoryStoreClient::new("notifications"));
        store.insert("n-3", note("ipctest", json!("2026-10-19T12:00:00.000Z"), false, false));
        store.insert("n-1", note("ipctest", json!("2026-10-19T10:00:00.000Z"), true, false));
        store.insert("n-2", note("ipctest", json!(1_792_407_600_000i64), false, false));
        store.insert("n-4", note("ipctest", json!("2026-10-19T13:00:00.000Z"), false, true));
        store.insert("n-5", note("other", json!("2026-10-19T09:00:00.000Z"), false, false));
        (store.clone(), MessageService::new(store))
    }

    fn ids(messages: &[JsonValue]) -> Vec<&str> {
        messages
            .iter()
            .map(|m| m["message"]["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn returns_live_messages_oldest_first_and_marks_them_seen() {
        let (store, service) = service();
        let messages = service.get_messages(&MessageQuery::for_user("ipctest")).await.unwrap();

        assert_eq!(ids(&messages), vec!["n-1", "n-2", "n-3"]);
        assert!(messages.iter().all(|m| m.get("seen").is_none()));
        assert!(messages.iter().all(|m| m["message"]["timestamp"].is_i64()));

        assert_eq!(store.calls().field_updates, 2);
        assert_eq!(store.get("n-3").unwrap()["seen"], true);
    }

    #[tokio::test]
    async fn limit_keeps_the_most_recent() {
        let (_store, service) = service();
        let query = MessageQuery {
            limit: Some(1),
            ..MessageQuery::for_user("ipctest")
        };
        let messages = service.get_messages(&query).await.unwrap();
        assert_eq!(ids(&messages), vec!["n-3"]);
    }

    #[tokio::test]
    async fn unseen_query_forces_the_seen_filter() {
        let (_store, service) = service();
        let messages = service
            .get_unseen_messages(&MessageQuery::for_user("ipctest"))
            .await
            .unwrap();
        assert_eq!(ids(&messages), vec!["n-2", "n-3"]);
    }

    #[tokio::test]
    async fn seen_update_failure_is_not_fatal() {
        let (store, service) = service();
        store.fail_field_updates(true);
        let messages = service.get_messages(&MessageQuery::for_user("ipctest")).await.unwrap();
        assert_eq!(messages.len(), 3);
    }

    #[tokio::test]
    async fn query_failure_is_a_store_error() {
        let (store, service) = service();
        store.fail_searches(true);
        let err = service.get_messages(&MessageQuery::for_user("ipctest")).await.unwrap_err();
        assert!(matches!(err, MessageServiceError::Store(_)));
    }

    #[tokio::test]
    async fn user_is_required() {
        let (_store, service) = service();
        let err = service.get_messages(&MessageQuery::default()).await.unwrap_err();
        assert!(matches!(err, MessageServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_marks_in_order_and_skips_unknown_ids() {
        let (store, service) = service();
        let report = service
            .delete(&DeleteRequest {
                uuids: vec!["n-1".into(), "nope".into(), "n-4".into(), "n-2".into()],
            })
            .await
            .unwrap();

        assert_eq!(report.deleted, vec!["n-1", "n-2"]);
        assert_eq!(report.missing, vec!["nope"]);
        assert_eq!(report.already_deleted, vec!["n-4"]);
        assert_eq!(store.get("n-1").unwrap()["deleted"], true);
        assert_eq!(store.calls().updates, 2);
    }

    #[tokio::test]
    async fn delete_aborts_on_first_store_failure() {
        let (store, service) = service();
        store.fail_updates(true);
        let err = service
            .delete(&DeleteRequest {
                uuids: vec!["n-1".into(), "n-2".into()],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MessageServiceError::Store(_)));
        assert_eq!(store.calls().updates, 1);
    }

    #[test]
    fn limit_parsing_is_lenient() {
        let parse = |v: JsonValue| -> Option<usize> {
            serde_json::from_value::<MessageQuery>(json!({ "user": "u", "limit": v }))
                .unwrap()
                .limit
        };
        assert_eq!(parse(json!(5)), Some(5));
        assert_eq!(parse(json!("12abc")), Some(12));
        assert_eq!(parse(json!("many")), None);
        assert_eq!(parse(json!(-3)), Some(0));
        assert_eq!(parse(JsonValue::Null), None);
    }
}
