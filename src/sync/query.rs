//! Query descriptors and fingerprints.

use crate::error::{Result, StoreError};
use serde_json::{Map, Value};
use std::fmt;

/// A backend query that can be fingerprinted and rebuilt from its
/// serialized form.
pub trait QueryDescriptor: Sized + Send + Sync + 'static {
    /// Target collection (class) name.
    fn collection(&self) -> &str;

    /// Serialized predicate.
    fn to_json(&self) -> Value;

    /// Rebuild a query from [`collection`](Self::collection) and
    /// [`to_json`](Self::to_json) output.
    fn from_json(collection: &str, query: Value) -> Result<Self>;

    /// Relations to resolve on entities delivered by the live feed.
    ///
    /// Read from a comma separated `include` key by default.
    fn includes(&self) -> Vec<String> {
        parse_includes(&self.to_json())
    }
}

fn parse_includes(query: &Value) -> Vec<String> {
    query
        .get("include")
        .and_then(Value::as_str)
        .map(split_list)
        .unwrap_or_default()
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Deterministic identity of a query.
///
/// Structurally equal queries produce equal fingerprints regardless of
/// instance or key insertion order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Fingerprint a query.
    pub fn of<Q: QueryDescriptor>(query: &Q) -> Result<Self> {
        let mut envelope = Map::new();
        envelope.insert("className".to_string(), Value::String(query.collection().to_string()));
        envelope.insert("query".to_string(), query.to_json());

        // serde_json maps keep keys sorted, so the text is canonical.
        Ok(Self(serde_json::to_string(&Value::Object(envelope))?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild the query this fingerprint was taken from.
    pub fn decode<Q: QueryDescriptor>(&self) -> Result<Q> {
        let envelope: Value = serde_json::from_str(&self.0)
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))?;

        let collection = envelope
            .get("className")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidQuery("fingerprint has no className".to_string()))?;
        let query = envelope.get("query").cloned().unwrap_or(Value::Null);

        Q::from_json(collection, query)
    }
}

impl fmt::Debug for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryFingerprint({})", self.0)
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A minimal query over one collection.
///
/// Serializes in the familiar `{"where": .., "include": "a,b", "order":
/// "-createdAt", "limit": 10}` shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    collection: String,
    constraints: Map<String, Value>,
    include: Vec<String>,
    order: Vec<String>,
    limit: Option<u64>,
}

impl Query {
    /// Query every entity of a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            constraints: Map::new(),
            include: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Require `key` to equal `value`.
    pub fn equal_to(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraint(key, value)
    }

    /// Attach a raw constraint, e.g. `json!({"$gt": 3})`.
    pub fn constraint(mut self, key: impl Into<String>, constraint: impl Into<Value>) -> Self {
        self.constraints.insert(key.into(), constraint.into());
        self
    }

    /// Resolve a relation on fetched entities.
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.include.push(field.into());
        self
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.order.push(field.into());
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.order.push(format!("-{}", field.into()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn constraints(&self) -> &Map<String, Value> {
        &self.constraints
    }

    pub fn includes_list(&self) -> &[String] {
        &self.include
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }
}

impl QueryDescriptor for Query {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn to_json(&self) -> Value {
        let mut json = Map::new();
        json.insert("where".to_string(), Value::Object(self.constraints.clone()));
        if !self.include.is_empty() {
            json.insert("include".to_string(), Value::String(self.include.join(",")));
        }
        if !self.order.is_empty() {
            json.insert("order".to_string(), Value::String(self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            json.insert("limit".to_string(), Value::from(limit));
        }
        Value::Object(json)
    }

    fn from_json(collection: &str, query: Value) -> Result<Self> {
        if collection.is_empty() {
            return Err(StoreError::InvalidQuery("empty collection name".to_string()));
        }

        let constraints = match query.get("where") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(StoreError::InvalidQuery(format!(
                    "`where` must be an object, got {}",
                    other
                )))
            }
        };

        let order = query
            .get("order")
            .and_then(Value::as_str)
            .map(split_list)
            .unwrap_or_default();

        let limit = match query.get("limit") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                StoreError::InvalidQuery(format!("`limit` must be a non-negative integer, got {}", value))
            })?),
        };

        Ok(Self {
            collection: collection.to_string(),
            constraints,
            include: parse_includes(&query),
            order,
            limit,
        })
    }

    fn includes(&self) -> Vec<String> {
        self.include.clone()
    }
}
