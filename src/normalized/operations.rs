//! Mutation application.

use crate::error::{Result, StoreError};
use crate::types::{Entities, Entity, Mutation};

/// Apply a mutation to a collection, returning the next collection.
///
/// The input is left untouched. Entities and patches with an empty id are
/// rejected before anything is applied.
pub fn apply_mutation<T: Entity>(entities: &Entities<T>, mutation: Mutation<T>) -> Result<Entities<T>> {
    let operation = mutation.name();

    match mutation {
        Mutation::Initialize(batch) => normalize(batch, operation),

        Mutation::SetMany(batch) => {
            let incoming = normalize(batch, operation)?;
            // Incoming entries win over existing ones on key collision.
            Ok(incoming.union(entities.clone()))
        }

        Mutation::Set(entity) => {
            require_id(entity.id(), operation)?;
            Ok(entities.update(entity.id().to_string(), entity))
        }

        Mutation::Update(patch) => {
            let id = T::patch_id(&patch).to_string();
            require_id(&id, operation)?;
            let merged = T::merge(entities.get(&id), patch);
            Ok(entities.update(id, merged))
        }

        Mutation::Remove(id) => {
            require_id(&id, operation)?;
            Ok(entities.without(&id))
        }
    }
}

/// Build a fresh collection from a list. Later entries win on duplicate ids.
fn normalize<T: Entity>(batch: Vec<T>, operation: &'static str) -> Result<Entities<T>> {
    let mut normalized = Entities::new();
    for entity in batch {
        require_id(entity.id(), operation)?;
        normalized.insert(entity.id().to_string(), entity);
    }
    Ok(normalized)
}

fn require_id(id: &str, operation: &'static str) -> Result<()> {
    if id.is_empty() {
        return Err(StoreError::MissingId { operation });
    }
    Ok(())
}
