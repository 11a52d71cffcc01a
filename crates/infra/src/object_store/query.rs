//! Filter documents for object store queries.
//!
//! Records are stored under a `state` key, so a condition on record field
//! `payload.status` is sent as `"state.payload.status"`. The persistent id is
//! addressed as the top-level `object_persistence_uuid`.

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

/// Key used by the store for a record's persistent id.
pub const ID_FIELD: &str = "object_persistence_uuid";

const STATE_PREFIX: &str = "state.";

/// A single filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq(JsonValue),
    /// Field equals one of the values.
    In(Vec<JsonValue>),
}

impl Condition {
    fn matches(&self, actual: Option<&JsonValue>) -> bool {
        match (self, actual) {
            (_, None) => false,
            (Condition::Eq(expected), Some(actual)) => expected == actual,
            (Condition::In(options), Some(actual)) => options.contains(actual),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Condition::Eq(value) => value.clone(),
            Condition::In(values) => serde_json::json!({ "$in": values }),
        }
    }
}

/// Structured filter: every condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: BTreeMap<String, Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the record with the given persistent id.
    pub fn by_id(id: impl Into<String>) -> Self {
        let mut query = Self::new();
        query
            .conditions
            .insert(ID_FIELD.to_string(), Condition::Eq(JsonValue::String(id.into())));
        query
    }

    /// Require record field `field` (dotted path) to equal `value`.
    pub fn eq(mut self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.conditions
            .insert(state_key(field), Condition::Eq(value.into()));
        self
    }

    /// Require record field `field` (dotted path) to be one of `values`.
    pub fn one_of<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.insert(state_key(field), Condition::In(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions keyed by their wire name (`state.<path>` or the id field).
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// The filter document sent to the store.
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .conditions
            .iter()
            .map(|(k, c)| (k.clone(), c.to_json()))
            .collect();
        JsonValue::Object(map)
    }

    /// Parse a filter document (the inverse of [`Query::to_json`]).
    pub fn from_json(doc: &JsonValue) -> Result<Self, String> {
        let obj = doc
            .as_object()
            .ok_or_else(|| "filter document must be an object".to_string())?;

        let mut conditions = BTreeMap::new();
        for (key, value) in obj {
            let condition = match value.as_object().and_then(|o| o.get("$in")) {
                Some(JsonValue::Array(values)) => Condition::In(values.clone()),
                Some(_) => return Err(format!("$in for {key} must be an array")),
                None => Condition::Eq(value.clone()),
            };
            conditions.insert(key.clone(), condition);
        }
        Ok(Self { conditions })
    }

    /// Evaluate the filter against a record and its persistent id.
    pub fn matches(&self, id: &str, state: &JsonValue) -> bool {
        let id_value = JsonValue::String(id.to_string());
        self.conditions.iter().all(|(key, condition)| {
            let actual = if key == ID_FIELD {
                Some(&id_value)
            } else {
                key.strip_prefix(STATE_PREFIX)
                    .and_then(|path| lookup(state, path))
            };
            condition.matches(actual)
        })
    }
}

fn state_key(field: &str) -> String {
    format!("{STATE_PREFIX}{field}")
}

/// Resolve a dotted path inside a JSON document.
pub fn lookup<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_state_prefixed_conditions() {
        let q = Query::new()
            .eq("payload.status", "Running")
            .one_of("uuid", ["a", "b"]);

        assert_eq!(
            q.to_json(),
            json!({
                "state.payload.status": "Running",
                "state.uuid": { "$in": ["a", "b"] },
            })
        );
    }

    #[test]
    fn id_query_uses_top_level_key() {
        assert_eq!(
            Query::by_id("p-1").to_json(),
            json!({ "object_persistence_uuid": "p-1" })
        );
    }

    #[test]
    fn from_json_inverts_to_json() {
        let q = Query::new().eq("user", "u").eq("deleted", false).one_of("uuid", ["x"]);
        assert_eq!(Query::from_json(&q.to_json()).unwrap(), q);
    }

    #[test]
    fn matches_nested_and_membership_conditions() {
        let state = json!({ "uuid": "a", "payload": { "status": "Running" } });
        assert!(Query::new().eq("payload.status", "Running").matches("p", &state));
        assert!(Query::new().one_of("uuid", ["b", "a"]).matches("p", &state));
        assert!(!Query::new().one_of("uuid", ["b"]).matches("p", &state));
        assert!(!Query::new().eq("missing", "x").matches("p", &state));
        assert!(Query::by_id("p").matches("p", &state));
        assert!(Query::new().matches("p", &state));
    }
}
