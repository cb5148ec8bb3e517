//! Core types for the normalized store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized collection: entity id to full entity value.
///
/// A persistent map, so cloning is O(1) and every mutation produces a new
/// value that shares structure with the previous one.
pub type Entities<T> = im::HashMap<String, T>;

/// A record that can live in a normalized collection.
///
/// `Patch` is the partial form accepted by
/// [`NormalizedStore::update`](crate::NormalizedStore::update). It must carry
/// the id of the entity it targets.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Partial form of the entity.
    type Patch: Clone + Send + Sync + 'static;

    /// Unique identifier. Empty ids are rejected by the store.
    fn id(&self) -> &str;

    /// Id targeted by a patch.
    fn patch_id(patch: &Self::Patch) -> &str;

    /// Overlay `patch` onto `existing`.
    ///
    /// Fields absent from the patch must keep their existing values. With no
    /// existing entry the result holds only what the patch supplies.
    fn merge(existing: Option<&Self>, patch: Self::Patch) -> Self;
}

/// Snapshot version. Bumped on every applied mutation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Version(pub u64);

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl Version {
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

/// Schemaless entity: an id plus a flat JSON object of attributes.
///
/// Serializes as a single object, e.g. `{"id": "a", "v": 1}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Create a document with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Set an attribute (builder style).
    ///
    /// `id` is reserved for the document key and is ignored here; build a
    /// new document to change it.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if key != "id" {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Read an attribute.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Parse a document from a JSON object. The object must carry a
    /// non-empty string `id`.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let mut fields = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(StoreError::Deserialization(format!(
                    "expected a JSON object, got {}",
                    other
                )))
            }
        };

        match fields.remove("id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(Self { id, fields }),
            _ => Err(StoreError::MissingId {
                operation: "Document::from_value",
            }),
        }
    }

    /// Convert back to a JSON object.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
        serde_json::Value::Object(map)
    }
}

impl Entity for Document {
    type Patch = Document;

    fn id(&self) -> &str {
        &self.id
    }

    fn patch_id(patch: &Document) -> &str {
        &patch.id
    }

    fn merge(existing: Option<&Self>, patch: Document) -> Self {
        let mut merged = existing
            .cloned()
            .unwrap_or_else(|| Document::new(patch.id.clone()));
        merged.fields.extend(patch.fields);
        merged
    }
}

/// Published view of a normalized collection.
///
/// Snapshots are immutable: a mutation publishes a new snapshot and leaves
/// earlier ones untouched.
#[derive(Clone, Serialize)]
pub struct Snapshot<T: Clone> {
    version: Version,
    entities: Entities<T>,
}

impl<T: Clone> Snapshot<T> {
    pub(crate) fn new(version: Version, entities: Entities<T>) -> Self {
        Self { version, entities }
    }

    /// Empty snapshot at version zero.
    pub fn empty() -> Self {
        Self::new(Version::default(), Entities::new())
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate `(id, entity)` pairs. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entities.iter()
    }

    /// Sorted list of ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The underlying map.
    pub fn entities(&self) -> &Entities<T> {
        &self.entities
    }

    /// True when both snapshots share the same map allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.entities.ptr_eq(&other.entities)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("entities", &self.entities)
            .finish()
    }
}

/// A mutation applied to a normalized collection.
pub enum Mutation<T: Entity> {
    /// Replace the whole collection.
    Initialize(Vec<T>),

    /// Merge many entities over the collection.
    SetMany(Vec<T>),

    /// Insert or overwrite one entity.
    Set(T),

    /// Shallow-merge a patch into an entity.
    Update(T::Patch),

    /// Delete by id.
    Remove(String),
}

impl<T: Entity> Clone for Mutation<T> {
    fn clone(&self) -> Self {
        match self {
            Mutation::Initialize(entities) => Mutation::Initialize(entities.clone()),
            Mutation::SetMany(entities) => Mutation::SetMany(entities.clone()),
            Mutation::Set(entity) => Mutation::Set(entity.clone()),
            Mutation::Update(patch) => Mutation::Update(patch.clone()),
            Mutation::Remove(id) => Mutation::Remove(id.clone()),
        }
    }
}

impl<T: Entity> Mutation<T> {
    /// Operation name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Initialize(_) => "initialize",
            Mutation::SetMany(_) => "set_many",
            Mutation::Set(_) => "set",
            Mutation::Update(_) => "update",
            Mutation::Remove(_) => "remove",
        }
    }
}

impl<T: Entity> fmt::Debug for Mutation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Initialize(entities) => write!(f, "Initialize({} entities)", entities.len()),
            Mutation::SetMany(entities) => write!(f, "SetMany({} entities)", entities.len()),
            Mutation::Set(entity) => write!(f, "Set({})", entity.id()),
            Mutation::Update(patch) => write!(f, "Update({})", T::patch_id(patch)),
            Mutation::Remove(id) => write!(f, "Remove({})", id),
        }
    }
}
