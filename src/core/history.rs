//! Append-only state change timeline.
//!
//! Every state change of an entity, including its enrollment, is one
//! immutable row. Rows are displayed newest first and paginated.

use super::entity::{Actor, EntityRef};
use super::ids::{EntityStateId, LogId, StateId, TransitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One recorded state change.
///
/// The enrollment row has neither `from_state_id` nor `transition_id` and no
/// `performed_by`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateLogEntry {
    pub id: LogId,
    pub entity_type: String,
    pub entity_id: String,
    pub entity_state_id: EntityStateId,
    pub from_state_id: Option<StateId>,
    pub to_state_id: StateId,
    pub transition_id: Option<TransitionId>,
    pub comment: Option<String>,
    pub performed_by: Option<Actor>,
    pub created_at: DateTime<Utc>,
}

impl StateLogEntry {
    pub fn is_enrollment(&self) -> bool {
        self.transition_id.is_none()
    }

    pub fn is_for(&self, entity: &EntityRef) -> bool {
        self.entity_type == entity.entity_type && self.entity_id == entity.entity_id
    }
}

/// A row to append; the store stamps its id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub entity: EntityRef,
    pub entity_state_id: EntityStateId,
    pub from_state_id: Option<StateId>,
    pub to_state_id: StateId,
    pub transition_id: Option<TransitionId>,
    pub comment: Option<String>,
    pub performed_by: Option<Actor>,
}

/// Display order: `created_at` descending, ties broken by id descending.
pub fn newest_first(a: &StateLogEntry, b: &StateLogEntry) -> Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// Pagination metadata for a timeline page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: usize,
    pub last_page: usize,
    pub per_page: usize,
    pub total: usize,
}

/// One page of an entity's timeline, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<StateLogEntry>,
    pub meta: PageMeta,
}

impl Timeline {
    /// Sort rows newest first and cut out the requested page.
    ///
    /// Pages are 1-based; page 0 is treated as page 1 and `per_page` is at
    /// least 1. A page past the end is empty but keeps the totals.
    pub fn paginate(mut entries: Vec<StateLogEntry>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = entries.len();
        let last_page = total.div_ceil(per_page).max(1);

        entries.sort_by(newest_first);
        let entries = entries
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Self {
            entries,
            meta: PageMeta {
                current_page: page,
                last_page,
                per_page,
                total,
            },
        }
    }

    pub fn has_next(&self) -> bool {
        self.meta.current_page < self.meta.last_page
    }

    pub fn has_prev(&self) -> bool {
        self.meta.current_page > 1
    }
}
