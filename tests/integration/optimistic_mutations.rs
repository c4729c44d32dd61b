//! Integration tests for the optimistic mutation pipeline.
//!
//! Drives `TaskStore` against the in-process gateway with held responses,
//! so the optimistic window between apply and commit/rollback is
//! observable from the test.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use taskdeck::cache::{InMemoryKeyValueStore, KeyValueStore, TaskCache};
use taskdeck::config::StoreConfig;
use taskdeck::gateway::GatewayError;
use taskdeck::gateway::memory::InMemoryGateway;
use taskdeck::session::{ACCESS_TOKEN_KEY, AuthState, Session};
use taskdeck::tasks::{
    ListParams, MutationAction, MutationError, Notification, ReconciliationEngine, TaskStore,
};
use taskdeck_proto::auth::TokenPair;
use taskdeck_proto::draft::{FieldErrors, TaskDraft};
use taskdeck_proto::task::{Category, Task, TaskPatch, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<TaskStore<InMemoryGateway>>,
    notifications: mpsc::Receiver<Notification>,
    gateway: Arc<InMemoryGateway>,
    session: Arc<Session>,
    kv: Arc<InMemoryKeyValueStore>,
}

fn harness() -> Harness {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let session = Arc::new(Session::init(kv.clone()));
    session.sign_in(TokenPair::new("access", "refresh")).unwrap();
    let gateway = Arc::new(InMemoryGateway::new());
    let (store, notifications) = TaskStore::new(
        ReconciliationEngine::new(TaskCache::new(kv.clone())),
        gateway.clone(),
        session.clone(),
        StoreConfig::default(),
    );
    Harness {
        store: Arc::new(store),
        notifications,
        gateway,
        session,
        kv,
    }
}

fn write_report() -> TaskDraft {
    TaskDraft {
        title: "Write report".to_string(),
        due_date: "2025-01-10".to_string(),
        category: Some(Category::Work),
        ..TaskDraft::default()
    }
}

/// Yields until the gateway has received `n` calls.
async fn wait_for_calls(gateway: &InMemoryGateway, n: u64) {
    while gateway.call_count() < n {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

async fn seed(h: &mut Harness, title: &str) -> Task {
    let draft = TaskDraft {
        title: title.to_string(),
        ..write_report()
    };
    let task = h.store.create(&draft).await.unwrap();
    drain(&mut h.notifications);
    task
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_create_shows_optimistic_record_then_rolls_back() {
    let mut h = harness();
    h.gateway.set_offline(true);
    h.gateway.hold();

    let pending = tokio::spawn({
        let store = Arc::clone(&h.store);
        async move { store.create(&write_report()).await }
    });
    wait_for_calls(&h.gateway, 1).await;

    let during = h.store.tasks().unwrap();
    assert_eq!(during.len(), 1);
    let optimistic = &during[0];
    assert!(optimistic.id.is_placeholder());
    assert_eq!(optimistic.title, "Write report");
    assert_eq!(optimistic.category, Category::Work);
    assert_eq!(
        optimistic.due_date,
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    );
    let view = h.store.list_view(&ListParams::default(), Utc::now()).unwrap();
    assert!(view.rows[0].pending);

    h.gateway.release();
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, MutationError::Rejected(GatewayError::Network(_))));

    assert!(h.store.tasks().unwrap().is_empty());
    assert_eq!(h.store.pending_count(), 0);
    let notifications = drain(&mut h.notifications);
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        &notifications[0],
        Notification::MutationFailed {
            action: MutationAction::Create,
            ..
        }
    ));
    assert_eq!(notifications[0].headline(), "Failed to create task");
}

#[tokio::test]
async fn confirmed_create_replaces_placeholder_with_server_record() {
    let mut h = harness();
    h.gateway.hold();

    let pending = tokio::spawn({
        let store = Arc::clone(&h.store);
        async move { store.create(&write_report()).await }
    });
    wait_for_calls(&h.gateway, 1).await;
    let placeholder = h.store.tasks().unwrap()[0].id.clone();

    h.gateway.release();
    let task = pending.await.unwrap().unwrap();

    let after = h.store.tasks().unwrap();
    assert_eq!(after, vec![task.clone()]);
    assert_ne!(task.id, placeholder);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(
        drain(&mut h.notifications),
        vec![Notification::TaskCreated {
            id: task.id,
            title: "Write report".into()
        }]
    );
}

#[tokio::test]
async fn optimistic_status_matches_committed_status() {
    let h = harness();
    h.gateway.hold();

    let pending = tokio::spawn({
        let store = Arc::clone(&h.store);
        async move { store.create(&write_report()).await }
    });
    wait_for_calls(&h.gateway, 1).await;
    let optimistic = h.store.tasks().unwrap()[0].status;

    h.gateway.release();
    let task = pending.await.unwrap().unwrap();
    assert_eq!(optimistic, task.status);
    assert_eq!(h.store.tasks().unwrap()[0].status, optimistic);
}

#[tokio::test]
async fn new_tasks_are_prepended() {
    let mut h = harness();
    let first = seed(&mut h, "first").await;
    let second = seed(&mut h, "second").await;
    let ids: Vec<_> = h.store.tasks().unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn server_validation_errors_surface_with_fields() {
    let mut h = harness();
    let fields: FieldErrors = [("title", "Title already used")].into_iter().collect();
    h.gateway.fail_next(GatewayError::Validation {
        message: "Invalid input".into(),
        fields: fields.clone(),
    });

    let err = h.store.create(&write_report()).await.unwrap_err();
    let MutationError::Rejected(gateway_err) = err else {
        panic!("expected a rejected mutation, got {err:?}");
    };
    assert_eq!(gateway_err.field_errors(), Some(&fields));
    assert!(h.store.tasks().unwrap().is_empty());
    assert_eq!(
        drain(&mut h.notifications),
        vec![Notification::MutationFailed {
            action: MutationAction::Create,
            message: "Invalid input".into()
        }]
    );
}

#[tokio::test]
async fn placeholder_cannot_be_edited_before_confirmation() {
    let h = harness();
    h.gateway.hold();
    let pending = tokio::spawn({
        let store = Arc::clone(&h.store);
        async move { store.create(&write_report()).await }
    });
    wait_for_calls(&h.gateway, 1).await;
    let placeholder = h.store.tasks().unwrap()[0].id.clone();

    let err = h
        .store
        .change_status(&placeholder, TaskStatus::Completed)
        .await
        .unwrap_err();
    assert_eq!(err, MutationError::NotCommitted(placeholder));
    assert_eq!(h.gateway.call_count(), 1);

    h.gateway.release();
    pending.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Concurrent mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutations_on_different_tasks_settle_independently() {
    let mut h = harness();
    let a = seed(&mut h, "a").await;
    let b = seed(&mut h, "b").await;
    let base = h.gateway.call_count();
    h.gateway.hold();

    let complete = tokio::spawn({
        let store = Arc::clone(&h.store);
        let id = a.id.clone();
        async move { store.change_status(&id, TaskStatus::Completed).await }
    });
    let remove = tokio::spawn({
        let store = Arc::clone(&h.store);
        let id = b.id.clone();
        async move { store.delete(&id).await }
    });
    wait_for_calls(&h.gateway, base + 2).await;
    assert_eq!(h.store.pending_count(), 2);
    let during = h.store.tasks().unwrap();
    assert_eq!(during.len(), 1);
    assert_eq!(during[0].status, TaskStatus::Completed);

    h.gateway.release();
    complete.await.unwrap().unwrap();
    remove.await.unwrap().unwrap();

    assert_eq!(h.store.pending_count(), 0);
    assert_eq!(h.store.tasks().unwrap(), h.gateway.tasks().await);
    let notifications = drain(&mut h.notifications);
    assert!(notifications.contains(&Notification::TaskCompleted {
        id: a.id,
        title: "a".into()
    }));
    assert!(notifications.contains(&Notification::TaskDeleted {
        id: b.id,
        title: "b".into()
    }));
}

#[tokio::test]
async fn same_task_edits_end_with_server_state() {
    let mut h = harness();
    let task = seed(&mut h, "original").await;
    let base = h.gateway.call_count();
    h.gateway.hold();

    let rename = |title: &'static str| {
        let store = Arc::clone(&h.store);
        let id = task.id.clone();
        tokio::spawn(async move {
            let patch = TaskPatch {
                title: Some(title.to_string()),
                ..TaskPatch::default()
            };
            store.update(&id, patch).await
        })
    };
    let first = rename("one");
    wait_for_calls(&h.gateway, base + 1).await;
    let second = rename("two");
    wait_for_calls(&h.gateway, base + 2).await;

    h.gateway.release();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let local = h.store.tasks().unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local, h.gateway.tasks().await);
}

#[tokio::test]
async fn two_failed_advances_restore_original_status() {
    let mut h = harness();
    let task = seed(&mut h, "cycle").await;
    let base = h.gateway.call_count();
    h.gateway.set_offline(true);
    h.gateway.hold();

    let advance = || {
        let store = Arc::clone(&h.store);
        let id = task.id.clone();
        tokio::spawn(async move { store.advance_status(&id).await })
    };
    let first = advance();
    wait_for_calls(&h.gateway, base + 1).await;
    let second = advance();
    wait_for_calls(&h.gateway, base + 2).await;
    assert_eq!(h.store.tasks().unwrap()[0].status, TaskStatus::Completed);

    h.gateway.release();
    assert!(first.await.unwrap().is_err());
    assert!(second.await.unwrap().is_err());

    assert_eq!(h.store.pending_count(), 0);
    assert_eq!(h.store.tasks().unwrap(), vec![task.clone()]);
    assert_eq!(TaskCache::new(h.kv.clone()).load(), vec![task]);
    let notifications = drain(&mut h.notifications);
    assert_eq!(notifications.len(), 2);
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_token_restores_task_and_signs_out() {
    let mut h = harness();
    let task = seed(&mut h, "keep me").await;
    let mut auth = h.session.subscribe();
    h.gateway.set_unauthorized(true);

    let err = h.store.delete(&task.id).await.unwrap_err();

    assert_eq!(err, MutationError::ReauthRequired);
    assert_eq!(h.store.tasks().unwrap(), vec![task]);
    assert_eq!(*auth.borrow_and_update(), AuthState::SignedOut);
    assert!(h.kv.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert_eq!(
        drain(&mut h.notifications),
        vec![Notification::ReauthRequired]
    );
}
