//! In-memory entity state store with transactional writes.

use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::core::{
    newest_first, EntityRef, EntityState, EntityStateId, LogId, LogRecord, PipelineId, StateId,
    StateLogEntry,
};
use crate::store::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// First-access enrollment of an entity into a pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Enrollment {
    pub entity: EntityRef,
    pub pipeline_id: PipelineId,
    pub initial_state_id: StateId,
    pub comment: String,
}

#[derive(Debug, Default)]
struct Tables {
    states: BTreeMap<EntityStateId, EntityState>,
    /// Unique index on `(entity_type, entity_id)`.
    by_entity: HashMap<EntityRef, EntityStateId>,
    logs: Vec<StateLogEntry>,
    next_state_id: u64,
    next_log_id: u64,
    last_stamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Timestamps never go backwards, so `created_at` order agrees with id
    /// order.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn allocate_log(&mut self, record: LogRecord) -> StateLogEntry {
        self.next_log_id += 1;
        StateLogEntry {
            id: LogId(self.next_log_id),
            entity_type: record.entity.entity_type,
            entity_id: record.entity.entity_id,
            entity_state_id: record.entity_state_id,
            from_state_id: record.from_state_id,
            to_state_id: record.to_state_id,
            transition_id: record.transition_id,
            comment: record.comment,
            performed_by: record.performed_by,
            created_at: self.stamp(),
        }
    }
}

/// Entity state records and their timeline.
///
/// Writes happen under one lock: enrollment inserts the record and its
/// enrollment row together, and [`transaction`](Self::transaction) stages
/// changes that only become visible when the closure succeeds.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    tables: RwLock<Tables>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, entity: &EntityRef) -> Result<Option<EntityState>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .by_entity
            .get(entity)
            .and_then(|id| tables.states.get(id))
            .cloned())
    }

    /// Insert a new record plus its enrollment row.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the entity is already
    /// enrolled; nothing is written in that case.
    pub fn enroll(&self, enrollment: Enrollment) -> Result<EntityState, StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        if tables.by_entity.contains_key(&enrollment.entity) {
            return Err(StoreError::UniqueViolation {
                entity_type: enrollment.entity.entity_type,
                entity_id: enrollment.entity.entity_id,
            });
        }

        tables.next_state_id += 1;
        let id = EntityStateId(tables.next_state_id);
        let now = tables.stamp();
        let state = EntityState {
            id,
            pipeline_id: enrollment.pipeline_id,
            entity_type: enrollment.entity.entity_type.clone(),
            entity_id: enrollment.entity.entity_id.clone(),
            current_state_id: enrollment.initial_state_id,
            created_at: now,
            updated_at: now,
        };

        let row = tables.allocate_log(LogRecord {
            entity: enrollment.entity.clone(),
            entity_state_id: id,
            from_state_id: None,
            to_state_id: enrollment.initial_state_id,
            transition_id: None,
            comment: Some(enrollment.comment),
            performed_by: None,
        });

        tables.by_entity.insert(enrollment.entity, id);
        tables.states.insert(id, state.clone());
        tables.logs.push(row);
        Ok(state)
    }

    /// Run `f` as one atomic unit.
    ///
    /// The write lock is held for the whole closure. Changes staged through
    /// the [`StateTransaction`] are applied only if `f` returns `Ok`; on
    /// `Err` they are discarded.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateTransaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut tx = StateTransaction {
            tables: &mut *tables,
            staged_states: BTreeMap::new(),
            staged_logs: Vec::new(),
        };
        let value = f(&mut tx)?;
        tx.commit();
        Ok(value)
    }

    /// All timeline rows of an entity, newest first.
    pub fn logs_for(&self, entity: &EntityRef) -> Result<Vec<StateLogEntry>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut rows: Vec<StateLogEntry> = tables
            .logs
            .iter()
            .filter(|row| row.is_for(entity))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    pub fn entity_state_count(&self) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.states.len())
    }

    pub fn log_count(&self) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.logs.len())
    }

    pub fn checkpoint(&self) -> Result<Checkpoint, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Checkpoint::new(
            tables.states.values().cloned().collect(),
            tables.logs.clone(),
        ))
    }

    /// Rebuild a store from a checkpoint. Id sequences resume after the
    /// highest restored ids.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, CheckpointError> {
        checkpoint.validate()?;

        let mut tables = Tables::default();
        for state in checkpoint.entity_states {
            tables.next_state_id = tables.next_state_id.max(state.id.0);
            tables.by_entity.insert(state.entity(), state.id);
            tables.states.insert(state.id, state);
        }
        for row in &checkpoint.state_logs {
            tables.next_log_id = tables.next_log_id.max(row.id.0);
            tables.last_stamp = tables.last_stamp.max(Some(row.created_at));
        }
        tables.logs = checkpoint.state_logs;
        tables.logs.sort_by_key(|row| row.id);

        Ok(Self {
            tables: RwLock::new(tables),
        })
    }
}

/// Staged writes against the state store.
pub struct StateTransaction<'a> {
    tables: &'a mut Tables,
    staged_states: BTreeMap<EntityStateId, EntityState>,
    staged_logs: Vec<StateLogEntry>,
}

impl StateTransaction<'_> {
    /// Current record of an entity, including staged changes.
    pub fn find(&self, entity: &EntityRef) -> Option<EntityState> {
        let id = self.tables.by_entity.get(entity)?;
        self.staged_states
            .get(id)
            .or_else(|| self.tables.states.get(id))
            .cloned()
    }

    /// Stage moving a record to a new state.
    pub fn advance(
        &mut self,
        id: EntityStateId,
        to_state_id: StateId,
    ) -> Result<EntityState, StoreError> {
        let mut state = self
            .staged_states
            .get(&id)
            .or_else(|| self.tables.states.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::EntityStateNotFound(id.to_string()))?;

        state.current_state_id = to_state_id;
        state.updated_at = self.tables.stamp();
        self.staged_states.insert(id, state.clone());
        Ok(state)
    }

    /// Stage a timeline row.
    pub fn append_log(&mut self, record: LogRecord) -> LogId {
        let row = self.tables.allocate_log(record);
        let id = row.id;
        self.staged_logs.push(row);
        id
    }

    fn commit(self) {
        for (id, state) in self.staged_states {
            self.tables.states.insert(id, state);
        }
        self.tables.logs.extend(self.staged_logs);
    }
}
