//! End-to-end behaviour of an asset lifecycle pipeline loaded from JSON.

use pipeline_fsm::builder::BuildError;
use pipeline_fsm::checkpoint::Checkpoint;
use pipeline_fsm::core::{Actor, EntityRef, FieldMap, TransitionId};
use pipeline_fsm::effects::{EntityStore, EntityStoreError, MemoryEntityStore};
use pipeline_fsm::enforcement::{
    PermissionSet, FIELDS_UNAVAILABLE_MESSAGE, PERMISSION_DENIED_MESSAGE,
};
use pipeline_fsm::{
    MemoryStateStore, PipelineApi, PipelineError, PipelineRegistry, TransitionOrchestrator,
    TransitionRequest,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const ASSET_PIPELINE: &str = r#"{
  "pipelines": [
    {
      "code": "asset_lifecycle",
      "entity_type": "asset",
      "name": "Asset Lifecycle",
      "states": [
        { "code": "draft", "name": "Draft", "type": "initial", "color": "gray", "sort_order": 1 },
        { "code": "active", "name": "Active", "type": "intermediate", "color": "green", "sort_order": 2 },
        { "code": "maintenance", "name": "Maintenance", "type": "intermediate", "icon": "wrench", "sort_order": 3 },
        { "code": "disposed", "name": "Disposed", "type": "final", "sort_order": 4 }
      ],
      "transitions": [
        {
          "code": "activate", "name": "Activate", "from": "draft", "to": "active",
          "required_permission": "assets.activate",
          "actions": [
            { "action_type": "update_field", "config": { "field": "status", "value": "active" }, "execution_order": 1 }
          ]
        },
        {
          "code": "send_maintenance", "name": "Send to Maintenance", "from": "active", "to": "maintenance",
          "actions": [
            { "action_type": "update_field", "config": { "field": "status", "value": "maintenance" }, "execution_order": 1 }
          ]
        },
        {
          "code": "complete_maintenance", "name": "Complete Maintenance", "from": "maintenance", "to": "active",
          "requires_comment": true,
          "actions": [
            { "action_type": "update_field", "config": { "field": "status", "value": "active" }, "execution_order": 1 }
          ]
        },
        {
          "code": "scrap", "name": "Scrap", "from": "maintenance", "to": "disposed",
          "guard_conditions": [ { "field": "status", "operator": "equals", "value": "active" } ]
        },
        {
          "code": "dispose", "name": "Dispose", "from": "active", "to": "disposed",
          "requires_confirmation": true,
          "guard_conditions": [
            { "field": "status", "operator": "equals", "value": "active" },
            { "field": "book_value", "operator": "less_than", "value": 100 }
          ],
          "actions": [
            { "action_type": "update_field", "config": { "field": "status", "value": "disposed" }, "execution_order": 2 },
            { "action_type": "update_field", "config": { "field": "disposed", "value": true }, "execution_order": 1 }
          ]
        }
      ]
    }
  ]
}"#;

/// Entity store whose reads and updates can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryEntityStore,
    reject_reads: AtomicBool,
    reject_updates: AtomicBool,
}

impl EntityStore for FlakyStore {
    fn read(&self, entity: &EntityRef) -> Result<FieldMap, EntityStoreError> {
        if self.reject_reads.load(Ordering::SeqCst) {
            return Err(EntityStoreError::Unavailable("replica offline".to_string()));
        }
        self.inner.read(entity)
    }

    fn update(&self, entity: &EntityRef, fields: &FieldMap) -> Result<(), EntityStoreError> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(EntityStoreError::Rejected("column is read-only".to_string()));
        }
        self.inner.update(entity, fields)
    }
}

type Engine = TransitionOrchestrator<Arc<FlakyStore>, PermissionSet>;

fn asset() -> EntityRef {
    EntityRef::new("asset", "1")
}

fn admin() -> Actor {
    Actor::new("admin", "Admin")
}

fn clerk() -> Actor {
    Actor::new("clerk", "Clerk")
}

fn engine() -> (Engine, Arc<FlakyStore>) {
    let registry = PipelineRegistry::from_json(ASSET_PIPELINE).unwrap();
    let entities = Arc::new(FlakyStore::default());
    let mut fields = FieldMap::new();
    fields.insert("status".to_string(), json!("draft"));
    fields.insert("book_value".to_string(), json!(40));
    entities.inner.insert(asset(), fields).unwrap();

    let permissions = PermissionSet::new().grant("admin", "assets.activate");
    let engine = TransitionOrchestrator::new(Arc::new(registry), entities.clone(), permissions);
    (engine, entities)
}

fn transition(engine: &Engine, code: &str) -> TransitionId {
    let registry = engine.registry();
    let pipeline = registry.pipeline_by_code("asset_lifecycle").unwrap();
    registry.transition_by_code(pipeline.id, code).unwrap().id
}

fn run(engine: &Engine, code: &str, comment: Option<&str>) -> Result<String, PipelineError> {
    engine
        .execute_transition(&asset(), transition(engine, code), comment, &admin())
        .map(|view| view.current_state.code)
}

#[test]
fn new_asset_starts_in_draft_and_permission_is_enforced() {
    let (engine, _) = engine();

    let view = engine.entity_state(&asset(), &clerk()).unwrap();
    assert_eq!(view.current_state.code, "draft");
    assert_eq!(view.current_state.color.as_deref(), Some("gray"));

    let activate = &view.available_transitions[0];
    assert_eq!(activate.transition.code, "activate");
    assert!(!activate.is_allowed);
    assert_eq!(activate.rejection_reasons, vec![PERMISSION_DENIED_MESSAGE]);

    let result = engine.execute_transition(&asset(), activate.transition.id, None, &clerk());
    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::PermissionDenied { .. }));
    assert_eq!(err.status_code(), 403);
}

#[test]
fn transition_from_wrong_state_is_invalid() {
    let (engine, _) = engine();

    let err = run(&engine, "send_maintenance", None).unwrap_err();

    assert!(matches!(err, PipelineError::InvalidStateTransition { .. }));
    assert_eq!(err.status_code(), 422);
    assert_eq!(engine.states().log_count().unwrap(), 1);
}

#[test]
fn required_comment_is_enforced_and_recorded() {
    let (engine, _) = engine();
    run(&engine, "activate", None).unwrap();
    run(&engine, "send_maintenance", None).unwrap();

    let err = run(&engine, "complete_maintenance", Some("")).unwrap_err();
    assert!(matches!(err, PipelineError::CommentRequired { .. }));

    assert_eq!(run(&engine, "complete_maintenance", Some("reason")).unwrap(), "active");
    let timeline = engine.timeline(&asset(), 1, None).unwrap();
    assert_eq!(timeline.entries[0].comment.as_deref(), Some("reason"));
}

#[test]
fn failed_guard_names_the_field() {
    let (engine, entities) = engine();
    run(&engine, "activate", None).unwrap();
    run(&engine, "send_maintenance", None).unwrap();
    assert_eq!(entities.inner.field(&asset(), "status"), Some(json!("maintenance")));

    let err = run(&engine, "scrap", None).unwrap_err();

    match err {
        PipelineError::GuardConditionFailed { reasons } => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("status must equals"));
        }
        other => panic!("expected guard failure, got {other:?}"),
    }
}

#[test]
fn every_failed_guard_is_reported() {
    let (engine, entities) = engine();
    run(&engine, "activate", None).unwrap();
    let mut fields = FieldMap::new();
    fields.insert("status".to_string(), json!("on_loan"));
    fields.insert("book_value".to_string(), json!(500));
    entities.inner.update(&asset(), &fields).unwrap();

    let available = engine.available_transitions(&asset(), &admin()).unwrap();
    let dispose = available
        .iter()
        .find(|a| a.transition.code == "dispose")
        .unwrap();
    assert!(!dispose.is_allowed);
    assert_eq!(dispose.rejection_reasons.len(), 2);

    let err = run(&engine, "dispose", None).unwrap_err();
    assert!(matches!(err, PipelineError::GuardConditionFailed { ref reasons } if reasons.len() == 2));
}

#[test]
fn timeline_lists_changes_newest_first() {
    let (engine, _) = engine();
    run(&engine, "activate", None).unwrap();
    run(&engine, "send_maintenance", None).unwrap();
    run(&engine, "complete_maintenance", Some("fixed")).unwrap();

    let timeline = engine.timeline(&asset(), 1, None).unwrap();

    assert_eq!(timeline.entries.len(), 4);
    assert_eq!(timeline.meta.per_page, 15);
    assert_eq!(timeline.meta.last_page, 1);
    assert_eq!(
        timeline.entries[0].transition_id,
        Some(transition(&engine, "complete_maintenance"))
    );
    assert!(timeline.entries[3].transition_id.is_none());
    assert_eq!(
        timeline.entries[3].comment.as_deref(),
        Some("Initial pipeline assignment")
    );
}

#[test]
fn actions_run_in_order_and_terminal_state_has_no_moves() {
    let (engine, entities) = engine();
    run(&engine, "activate", None).unwrap();

    assert_eq!(run(&engine, "dispose", None).unwrap(), "disposed");

    assert_eq!(entities.inner.field(&asset(), "status"), Some(json!("disposed")));
    assert_eq!(entities.inner.field(&asset(), "disposed"), Some(json!(true)));
    let view = engine.entity_state(&asset(), &admin()).unwrap();
    assert!(view.available_transitions.is_empty());

    let err = run(&engine, "send_maintenance", None).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidStateTransition { .. }));
}

#[test]
fn rejected_action_leaves_nothing_behind() {
    let (engine, entities) = engine();
    entities.reject_updates.store(true, Ordering::SeqCst);

    let err = run(&engine, "activate", None).unwrap_err();

    assert!(matches!(err, PipelineError::ActionExecutionFailed(_)));
    assert!(!err.is_user_facing());
    assert_eq!(entities.inner.field(&asset(), "status"), Some(json!("draft")));
    let state = engine.states().find(&asset()).unwrap().unwrap();
    assert_eq!(engine.registry().state(state.current_state_id).unwrap().code, "draft");
    assert_eq!(engine.states().log_count().unwrap(), 1);

    entities.reject_updates.store(false, Ordering::SeqCst);
    assert_eq!(run(&engine, "activate", None).unwrap(), "active");
}

#[test]
fn unknown_domain_entity_aborts_actions() {
    let (engine, _) = engine();
    let ghost = EntityRef::new("asset", "404");

    let err = engine
        .execute_transition(&ghost, transition(&engine, "activate"), None, &admin())
        .unwrap_err();

    assert!(matches!(err, PipelineError::ActionExecutionFailed(_)));
    let state = engine.states().find(&ghost).unwrap().unwrap();
    assert_eq!(engine.registry().state(state.current_state_id).unwrap().code, "draft");
    assert_eq!(engine.states().logs_for(&ghost).unwrap().len(), 1);
}

#[test]
fn unreadable_entity_after_commit_still_reports_success() {
    let (engine, entities) = engine();
    engine.entity_state(&asset(), &admin()).unwrap();
    entities.reject_reads.store(true, Ordering::SeqCst);

    let view = engine
        .execute_transition(&asset(), transition(&engine, "activate"), None, &admin())
        .unwrap();

    assert_eq!(view.current_state.code, "active");
    assert_eq!(entities.inner.field(&asset(), "status"), Some(json!("active")));
    let moves: Vec<(&str, bool)> = view
        .available_transitions
        .iter()
        .map(|a| (a.transition.code.as_str(), a.is_allowed))
        .collect();
    assert!(moves.contains(&("send_maintenance", true)));
    assert!(moves.contains(&("dispose", false)));
    let dispose = view
        .available_transitions
        .iter()
        .find(|a| a.transition.code == "dispose")
        .unwrap();
    assert_eq!(dispose.rejection_reasons, vec![FIELDS_UNAVAILABLE_MESSAGE]);
    assert_eq!(engine.timeline(&asset(), 1, None).unwrap().meta.total, 2);

    entities.reject_reads.store(false, Ordering::SeqCst);
    let again = run(&engine, "activate", None).unwrap_err();
    assert!(matches!(again, PipelineError::InvalidStateTransition { .. }));
}

#[test]
fn unknown_action_type_fails_loading() {
    let config = ASSET_PIPELINE.replacen("\"update_field\"", "\"send_email\"", 1);

    let err = PipelineRegistry::from_json(&config).unwrap_err();

    assert!(matches!(err, BuildError::InvalidAction { .. }));
}

#[test]
fn api_reports_status_codes() {
    let (engine, _) = engine();
    let api = PipelineApi::new(&engine);

    assert_eq!(api.show(&asset(), Some(&admin())).unwrap().status, 201);
    assert_eq!(api.show(&asset(), Some(&admin())).unwrap().status, 200);
    assert_eq!(api.show(&asset(), None).unwrap_err().status, 401);

    let wrong_state = TransitionRequest {
        transition_id: transition(&engine, "send_maintenance"),
        comment: None,
    };
    let err = api.transition(&asset(), &wrong_state, Some(&admin())).unwrap_err();
    assert_eq!(err.status, 422);
    assert_eq!(err.errors_for("transition_id").len(), 1);

    let activate = TransitionRequest {
        transition_id: transition(&engine, "activate"),
        comment: None,
    };
    let response = api.transition(&asset(), &activate, Some(&admin())).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.current_state.code, "active");
    assert!(response
        .body
        .available_transitions
        .iter()
        .any(|t| t.code == "dispose" && t.requires_confirmation));
}

#[test]
fn checkpoint_restores_progress() {
    let (engine, _) = engine();
    run(&engine, "activate", None).unwrap();

    let json = engine.states().checkpoint().unwrap().to_json().unwrap();
    let restored = MemoryStateStore::from_checkpoint(Checkpoint::from_json(&json).unwrap()).unwrap();
    let (fresh, _) = engine_with(restored);

    let view = fresh.entity_state(&asset(), &admin()).unwrap();
    assert!(!view.created);
    assert_eq!(view.current_state.code, "active");
    assert_eq!(fresh.timeline(&asset(), 1, None).unwrap().meta.total, 2);
}

fn engine_with(states: MemoryStateStore) -> (Engine, Arc<FlakyStore>) {
    let (engine, entities) = engine();
    (engine.with_state_store(states), entities)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_enrolls_once() {
    let (engine, _) = engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || engine.entity_state(&asset(), &admin()))
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(engine.states().entity_state_count().unwrap(), 1);
    assert_eq!(engine.states().log_count().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_transitions_advance_once() {
    let (engine, _) = engine();
    let engine = Arc::new(engine);
    engine.entity_state(&asset(), &admin()).unwrap();
    let activate = transition(&engine, "activate");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || {
                engine.execute_transition(&asset(), activate, None, &admin())
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(err) => assert!(matches!(err, PipelineError::InvalidStateTransition { .. })),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(engine.states().log_count().unwrap(), 2);
}
