//! Domain entity store collaborator.

use crate::core::{EntityRef, FieldMap};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors raised by a domain entity store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EntityStoreError {
    #[error("Entity {entity_type}/{entity_id} not found")]
    NotFound {
        entity_type: String,
        entity_id: String,
    },

    #[error("Update rejected: {0}")]
    Rejected(String),

    #[error("Entity store unavailable: {0}")]
    Unavailable(String),
}

impl EntityStoreError {
    pub fn not_found(entity: &EntityRef) -> Self {
        Self::NotFound {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id.clone(),
        }
    }
}

/// Capability interface over the host's domain entities.
///
/// Entities of every kind are reached through the same two operations,
/// keyed by [`EntityRef`]. `update` must apply all given fields or none.
pub trait EntityStore: Send + Sync {
    /// Fresh snapshot of the entity's readable fields.
    fn read(&self, entity: &EntityRef) -> Result<FieldMap, EntityStoreError>;

    /// Write the given fields onto the entity.
    fn update(&self, entity: &EntityRef, fields: &FieldMap) -> Result<(), EntityStoreError>;
}

impl<T: EntityStore + ?Sized> EntityStore for std::sync::Arc<T> {
    fn read(&self, entity: &EntityRef) -> Result<FieldMap, EntityStoreError> {
        (**self).read(entity)
    }

    fn update(&self, entity: &EntityRef, fields: &FieldMap) -> Result<(), EntityStoreError> {
        (**self).update(entity, fields)
    }
}

/// In-memory entity store, keyed by entity reference.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entities: RwLock<HashMap<EntityRef, FieldMap>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity's fields.
    pub fn insert(&self, entity: EntityRef, fields: FieldMap) -> Result<(), EntityStoreError> {
        let mut entities = self.entities.write().map_err(|_| lock_error())?;
        entities.insert(entity, fields);
        Ok(())
    }

    /// Read a single field, `None` if the entity or field is absent.
    pub fn field(&self, entity: &EntityRef, field: &str) -> Option<serde_json::Value> {
        self.entities
            .read()
            .ok()
            .and_then(|entities| entities.get(entity).and_then(|f| f.get(field).cloned()))
    }
}

fn lock_error() -> EntityStoreError {
    EntityStoreError::Unavailable("entity store lock poisoned".to_string())
}

impl EntityStore for MemoryEntityStore {
    fn read(&self, entity: &EntityRef) -> Result<FieldMap, EntityStoreError> {
        let entities = self.entities.read().map_err(|_| lock_error())?;
        entities
            .get(entity)
            .cloned()
            .ok_or_else(|| EntityStoreError::not_found(entity))
    }

    fn update(&self, entity: &EntityRef, fields: &FieldMap) -> Result<(), EntityStoreError> {
        let mut entities = self.entities.write().map_err(|_| lock_error())?;
        let current = entities
            .get_mut(entity)
            .ok_or_else(|| EntityStoreError::not_found(entity))?;
        for (field, value) in fields {
            current.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}
