//! HTTP-shaped surface over the orchestrator.
//!
//! No server is bundled. Each method returns a status code and a serde
//! payload matching the entity-state endpoints:
//!
//! - `GET  /entity-states/{type}/{id}` -> [`PipelineApi::show`]
//! - `POST /entity-states/{type}/{id}/transition` -> [`PipelineApi::transition`]
//! - `GET  /entity-states/{type}/{id}/timeline?page=N` -> [`PipelineApi::timeline`]

use crate::core::{
    Actor, EntityRef, PageMeta, PipelineState, StateId, StateLogEntry, Timeline, TransitionId,
};
use crate::effects::EntityStore;
use crate::enforcement::{Authorizer, TransitionAvailability};
use crate::error::PipelineError;
use crate::orchestrator::{EntityView, TransitionOrchestrator};
use crate::registry::PipelineRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthenticated.";
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response<T> {
    pub status: u16,
    pub body: T,
}

impl<T> Response<T> {
    fn ok(body: T) -> Self {
        Self { status: 200, body }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Failed request: status plus a caller-facing body.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{status}: {}", .body.message)]
pub struct ApiError {
    pub status: u16,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self {
            status: 401,
            body: ErrorBody {
                message: UNAUTHENTICATED_MESSAGE.to_string(),
                errors: BTreeMap::new(),
            },
        }
    }

    pub fn errors_for(&self, key: &str) -> &[String] {
        self.body.errors.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = err.status_code();
        if !err.is_user_facing() {
            error!(kind = err.kind(), error = %err, "pipeline request failed");
            return Self {
                status,
                body: ErrorBody {
                    message: SERVER_ERROR_MESSAGE.to_string(),
                    errors: BTreeMap::new(),
                },
            };
        }

        let mut errors = BTreeMap::new();
        if let Some(key) = err.error_key() {
            errors.insert(key.to_string(), err.field_messages());
        }
        Self {
            status,
            body: ErrorBody {
                message: err.to_string(),
                errors,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TransitionRequest {
    pub transition_id: TransitionId,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub id: StateId,
    pub code: String,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl From<&PipelineState> for StateSummary {
    fn from(state: &PipelineState) -> Self {
        Self {
            id: state.id,
            code: state.code.clone(),
            name: state.name.clone(),
            color: state.color.clone(),
            icon: state.icon.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AvailableTransitionPayload {
    pub id: TransitionId,
    pub code: String,
    pub name: String,
    pub to_state_id: StateId,
    pub requires_confirmation: bool,
    pub requires_comment: bool,
    pub is_allowed: bool,
    pub rejection_reasons: Vec<String>,
}

impl From<&TransitionAvailability> for AvailableTransitionPayload {
    fn from(availability: &TransitionAvailability) -> Self {
        let transition = &availability.transition;
        Self {
            id: transition.id,
            code: transition.code.clone(),
            name: transition.name.clone(),
            to_state_id: transition.to_state_id,
            requires_confirmation: transition.requires_confirmation,
            requires_comment: transition.requires_comment,
            is_allowed: availability.is_allowed,
            rejection_reasons: availability.rejection_reasons.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityStatePayload {
    pub entity_type: String,
    pub entity_id: String,
    pub pipeline: String,
    pub current_state: StateSummary,
    pub available_transitions: Vec<AvailableTransitionPayload>,
}

impl From<&EntityView> for EntityStatePayload {
    fn from(view: &EntityView) -> Self {
        Self {
            entity_type: view.entity.entity_type.clone(),
            entity_id: view.entity.entity_id.clone(),
            pipeline: view.pipeline.code.clone(),
            current_state: StateSummary::from(&view.current_state),
            available_transitions: view
                .available_transitions
                .iter()
                .map(AvailableTransitionPayload::from)
                .collect(),
        }
    }
}

/// `{code, name}` of a state or transition referenced by a timeline row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedRef {
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineItem {
    pub id: u64,
    pub from_state: Option<NamedRef>,
    pub to_state: Option<NamedRef>,
    pub transition: Option<NamedRef>,
    pub comment: Option<String>,
    pub performed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimelineItem {
    fn resolve(row: &StateLogEntry, registry: &PipelineRegistry) -> Self {
        let state = |id: StateId| {
            registry.state(id).map(|s| NamedRef {
                code: s.code,
                name: s.name,
            })
        };
        Self {
            id: row.id.0,
            from_state: row.from_state_id.and_then(state),
            to_state: state(row.to_state_id),
            transition: row
                .transition_id
                .and_then(|id| registry.transition(id))
                .map(|t| NamedRef {
                    code: t.code,
                    name: t.name,
                }),
            comment: row.comment.clone(),
            performed_by: row.performed_by.as_ref().map(|actor| actor.name.clone()),
            created_at: row.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    fn for_page(path: &str, timeline: &Timeline) -> Self {
        let link = |page: usize| format!("{path}?page={page}");
        let meta = timeline.meta;
        Self {
            first: link(1),
            last: link(meta.last_page),
            prev: timeline.has_prev().then(|| link(meta.current_page - 1)),
            next: timeline.has_next().then(|| link(meta.current_page + 1)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelinePayload {
    pub data: Vec<TimelineItem>,
    pub meta: PageMeta,
    pub links: PageLinks,
}

/// Request handlers bound to one orchestrator.
pub struct PipelineApi<'a, E, A> {
    orchestrator: &'a TransitionOrchestrator<E, A>,
}

impl<'a, E, A> PipelineApi<'a, E, A>
where
    E: EntityStore,
    A: Authorizer,
{
    pub fn new(orchestrator: &'a TransitionOrchestrator<E, A>) -> Self {
        Self { orchestrator }
    }

    /// Current state and available transitions. 201 on the call that
    /// enrolled the entity, 200 afterwards.
    pub fn show(
        &self,
        entity: &EntityRef,
        actor: Option<&Actor>,
    ) -> Result<Response<EntityStatePayload>, ApiError> {
        let actor = actor.ok_or_else(ApiError::unauthenticated)?;
        let view = self.orchestrator.entity_state(entity, actor)?;
        let status = if view.created { 201 } else { 200 };
        Ok(Response {
            status,
            body: EntityStatePayload::from(&view),
        })
    }

    pub fn transition(
        &self,
        entity: &EntityRef,
        request: &TransitionRequest,
        actor: Option<&Actor>,
    ) -> Result<Response<EntityStatePayload>, ApiError> {
        let actor = actor.ok_or_else(ApiError::unauthenticated)?;
        let view = self.orchestrator.execute_transition(
            entity,
            request.transition_id,
            request.comment.as_deref(),
            actor,
        )?;
        Ok(Response::ok(EntityStatePayload::from(&view)))
    }

    pub fn timeline(
        &self,
        entity: &EntityRef,
        page: usize,
        actor: Option<&Actor>,
    ) -> Result<Response<TimelinePayload>, ApiError> {
        actor.ok_or_else(ApiError::unauthenticated)?;
        let timeline = self.orchestrator.timeline(entity, page, None)?;
        let registry = self.orchestrator.registry();
        let path = format!(
            "/entity-states/{}/{}/timeline",
            entity.entity_type, entity.entity_id
        );

        Ok(Response::ok(TimelinePayload {
            data: timeline
                .entries
                .iter()
                .map(|row| TimelineItem::resolve(row, registry))
                .collect(),
            meta: timeline.meta,
            links: PageLinks::for_page(&path, &timeline),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PipelineBuilder, TransitionBuilder};
    use crate::effects::{ActionError, MemoryEntityStore};
    use crate::enforcement::{PermissionSet, PERMISSION_DENIED_MESSAGE};
    use std::sync::Arc;

    type Engine = TransitionOrchestrator<MemoryEntityStore, PermissionSet>;

    fn orchestrator() -> Engine {
        let registry = PipelineRegistry::new();
        registry
            .register(
                PipelineBuilder::new("ticket_flow", "ticket")
                    .initial("open", "Open")
                    .final_state("closed", "Closed")
                    .transition(
                        TransitionBuilder::new("close")
                            .name("Close")
                            .from("open")
                            .to("closed")
                            .permission("tickets.close"),
                    )
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let permissions = PermissionSet::new().grant("lead", "tickets.close");
        TransitionOrchestrator::new(Arc::new(registry), MemoryEntityStore::new(), permissions)
    }

    fn close_id(orchestrator: &Engine) -> TransitionId {
        let registry = orchestrator.registry();
        let pipeline = registry.pipeline_by_code("ticket_flow").unwrap();
        registry.transition_by_code(pipeline.id, "close").unwrap().id
    }

    #[test]
    fn show_returns_created_then_ok() {
        let orchestrator = orchestrator();
        let api = PipelineApi::new(&orchestrator);
        let ticket = EntityRef::new("ticket", "7");
        let lead = Actor::new("lead", "Lead");

        let first = api.show(&ticket, Some(&lead)).unwrap();
        let second = api.show(&ticket, Some(&lead)).unwrap();

        assert_eq!(first.status, 201);
        assert_eq!(second.status, 200);
        assert_eq!(first.body.current_state.code, "open");
    }

    #[test]
    fn missing_actor_is_unauthenticated() {
        let orchestrator = orchestrator();
        let api = PipelineApi::new(&orchestrator);

        let err = api.show(&EntityRef::new("ticket", "7"), None).unwrap_err();

        assert_eq!(err.status, 401);
        assert_eq!(orchestrator.states().entity_state_count().unwrap(), 0);
    }

    #[test]
    fn unsupported_type_is_bad_request() {
        let orchestrator = orchestrator();
        let api = PipelineApi::new(&orchestrator);

        let err = api
            .show(&EntityRef::new("invoice", "1"), Some(&Actor::new("lead", "Lead")))
            .unwrap_err();

        assert_eq!(err.status, 400);
        assert_eq!(err.body.message, "Entity type invoice does not support pipelines.");
    }

    #[test]
    fn denied_transition_is_forbidden() {
        let orchestrator = orchestrator();
        let api = PipelineApi::new(&orchestrator);
        let request = TransitionRequest {
            transition_id: close_id(&orchestrator),
            comment: None,
        };

        let guest = Actor::new("guest", "Guest");
        let err = api
            .transition(&EntityRef::new("ticket", "7"), &request, Some(&guest))
            .unwrap_err();

        assert_eq!(err.status, 403);
        assert_eq!(err.body.message, PERMISSION_DENIED_MESSAGE);
    }

    #[test]
    fn server_errors_are_opaque() {
        let err = ApiError::from(PipelineError::from(ActionError::UnknownActionType(
            "send_email".to_string(),
        )));

        assert_eq!(err.status, 500);
        assert_eq!(err.body.message, SERVER_ERROR_MESSAGE);
        assert!(err.body.errors.is_empty());
    }

    #[test]
    fn guard_failures_are_listed_under_guards() {
        let err = ApiError::from(PipelineError::GuardConditionFailed {
            reasons: vec!["one".to_string(), "two".to_string()],
        });

        assert_eq!(err.status, 422);
        assert_eq!(err.errors_for("guards"), ["one", "two"]);
    }

    #[test]
    fn timeline_resolves_names_and_links() {
        let orchestrator = orchestrator();
        let api = PipelineApi::new(&orchestrator);
        let ticket = EntityRef::new("ticket", "7");
        let lead = Actor::new("lead", "Lead");
        let request = TransitionRequest {
            transition_id: close_id(&orchestrator),
            comment: Some("done".to_string()),
        };
        api.transition(&ticket, &request, Some(&lead)).unwrap();

        let response = api.timeline(&ticket, 1, Some(&lead)).unwrap();
        let payload = response.body;

        assert_eq!(payload.data.len(), 2);
        let latest = &payload.data[0];
        assert_eq!(latest.transition.as_ref().unwrap().code, "close");
        assert_eq!(latest.from_state.as_ref().unwrap().name, "Open");
        assert_eq!(latest.performed_by.as_deref(), Some("Lead"));
        assert_eq!(latest.comment.as_deref(), Some("done"));
        assert!(payload.data[1].transition.is_none());
        assert_eq!(payload.links.first, "/entity-states/ticket/7/timeline?page=1");
        assert_eq!(payload.links.next, None);
    }

    #[test]
    fn transition_request_parses_without_comment() {
        let request: TransitionRequest = serde_json::from_str(r#"{"transition_id": 3}"#).unwrap();
        assert_eq!(request.transition_id, TransitionId(3));
        assert_eq!(request.comment, None);
    }
}
