//! Integration tests for the GraphQL gateway.
//!
//! A scripted transport encodes each request to JSON bytes, records it,
//! and answers with a queued reply decoded from bytes, so the gateway and
//! the wire codec are exercised end to end without a network.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};

use taskdeck::cache::{InMemoryKeyValueStore, TaskCache};
use taskdeck::config::StoreConfig;
use taskdeck::gateway::graphql::{GraphqlGateway, GraphqlTransport, TransportError};
use taskdeck::gateway::{AuthApi, DashboardSource, GatewayError, GatewayErrorKind, TaskGateway};
use taskdeck::session::Session;
use taskdeck::tasks::{MutationError, Notification, ReconciliationEngine, TaskStore};
use taskdeck_proto::auth::{Credentials, TokenPair};
use taskdeck_proto::draft::{FieldErrors, TaskDraft};
use taskdeck_proto::graphql::{
    CodecError, GraphqlError, GraphqlRequest, GraphqlResponse, codes, decode_response,
    encode_request,
};
use taskdeck_proto::query::{Pagination, SortDirection, TaskFilter, TaskSort};
use taskdeck_proto::task::{Category, TaskId, TaskPatch, TaskStatus};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Call {
    operation: String,
    variables: Value,
    bearer: Option<String>,
}

#[derive(Default)]
struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Result<GraphqlResponse, TransportError>>>,
}

impl ScriptedTransport {
    fn reply(&self, reply: Result<GraphqlResponse, TransportError>) {
        self.replies.lock().push_back(reply);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl GraphqlTransport for ScriptedTransport {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        bearer: Option<&str>,
    ) -> Result<GraphqlResponse, TransportError> {
        let body: Value =
            serde_json::from_slice(&encode_request(request)?).map_err(CodecError::from)?;
        self.calls.lock().push(Call {
            operation: body["operationName"].as_str().unwrap_or_default().to_string(),
            variables: body["variables"].clone(),
            bearer: bearer.map(str::to_string),
        });

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Io("no scripted reply".into())))?;
        let bytes = serde_json::to_vec(&reply).map_err(CodecError::from)?;
        Ok(decode_response(&bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn signed_in_gateway() -> (GraphqlGateway<ScriptedTransport>, Arc<Session>) {
    let session = Arc::new(Session::init(Arc::new(InMemoryKeyValueStore::new())));
    session.sign_in(TokenPair::new("bearer-1", "refresh-1")).unwrap();
    let gateway = GraphqlGateway::new(ScriptedTransport::default(), Arc::clone(&session));
    (gateway, session)
}

fn task_json(id: &str, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "",
        "status": status,
        "category": "WORK",
        "priority": "MEDIUM",
        "dueDate": "2025-01-10T00:00:00Z",
        "startDate": "2025-01-05T09:00:00Z",
        "createdAt": "2025-01-05T09:00:00Z",
        "updatedAt": "2025-01-05T09:00:00Z",
    })
}

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_sends_bearer_paging_and_sort() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Ok(GraphqlResponse::with_field(
        "getAllTasks",
        json!([task_json("t1", "One", "PENDING"), task_json("t2", "Two", "COMPLETED")]),
    )));

    let filter = TaskFilter {
        category: Some(Category::Work),
        ..TaskFilter::default()
    };
    let sort = TaskSort {
        due_date: Some(SortDirection::Asc),
        ..TaskSort::default()
    };
    let tasks = gateway
        .list(&filter, Pagination::first(10).next(), Some(&sort))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].status, TaskStatus::Completed);
    assert_eq!(
        tasks[0].due_date,
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    );

    let call = &gateway.transport().calls()[0];
    assert_eq!(call.operation, "GetAllTasks");
    assert_eq!(call.bearer.as_deref(), Some("bearer-1"));
    assert_eq!(call.variables["skip"], 10);
    assert_eq!(call.variables["take"], 10);
    assert_eq!(call.variables["filter"]["category"], "WORK");
    assert_eq!(call.variables["sort"]["dueDate"], "asc");
}

#[tokio::test]
async fn update_flattens_patch_next_to_id() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Ok(GraphqlResponse::with_field(
        "updateTask",
        task_json("t1", "One", "IN_PROGRESS"),
    )));

    let task = gateway
        .update(&TaskId::new("t1"), &TaskPatch::status(TaskStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    let vars = &gateway.transport().calls()[0].variables;
    assert_eq!(vars["id"], "t1");
    assert_eq!(vars["status"], "IN_PROGRESS");
    assert!(vars.get("title").is_none());
}

#[tokio::test]
async fn auth_calls_send_no_bearer() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Ok(GraphqlResponse::with_field(
        "login",
        json!({ "accessToken": "a2", "refreshToken": "r2" }),
    )));

    let tokens = gateway
        .login(&Credentials {
            email: "me@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert_eq!(tokens, TokenPair::new("a2", "r2"));

    let call = &gateway.transport().calls()[0];
    assert_eq!(call.operation, "Login");
    assert!(call.bearer.is_none());
    assert_eq!(call.variables["email"], "me@example.com");
}

#[tokio::test]
async fn dashboard_is_decoded_verbatim() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Ok(GraphqlResponse::with_field(
        "getDashboard",
        json!({
            "totalTasks": 12,
            "completedTasks": 5,
            "pendingTasks": 4,
            "inProgressTasks": 3,
            "totalUsers": 2,
            "activeUsers": 1,
            "inactiveUsers": 1,
            "tasksByCategory": [{ "category": "WORK", "_count": 7 }],
            "tasksByPriority": [{ "priority": "HIGH", "_count": 2 }],
            "overallProgress": 41.67,
        }),
    )));

    let stats = gateway.dashboard().await.unwrap();
    assert_eq!(stats.total_tasks, 12);
    assert_eq!(stats.category_count(Category::Work), 7);
    assert!((stats.overall_progress - 41.67).abs() < f64::EPSILON);
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failures_classify() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Err(TransportError::Timeout));
    gateway
        .transport()
        .reply(Err(TransportError::Http { status: 401 }));
    gateway
        .transport()
        .reply(Err(TransportError::Http { status: 500 }));

    let id = TaskId::new("t1");
    let kinds = [
        gateway.delete(&id).await.unwrap_err().kind(),
        gateway.delete(&id).await.unwrap_err().kind(),
        gateway.delete(&id).await.unwrap_err().kind(),
    ];
    assert_eq!(
        kinds,
        [
            GatewayErrorKind::Network,
            GatewayErrorKind::Unauthorized,
            GatewayErrorKind::Unknown
        ]
    );
}

#[tokio::test]
async fn missing_result_field_is_unknown() {
    let (gateway, _) = signed_in_gateway();
    gateway.transport().reply(Ok(GraphqlResponse::default()));
    let err = gateway.dashboard().await.unwrap_err();
    assert!(matches!(err, GatewayError::Unknown(_)));
}

// ---------------------------------------------------------------------------
// Through the task store
// ---------------------------------------------------------------------------

fn make_store() -> (
    TaskStore<GraphqlGateway<ScriptedTransport>>,
    tokio::sync::mpsc::Receiver<Notification>,
    Arc<Session>,
) {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let session = Arc::new(Session::init(kv.clone()));
    session.sign_in(TokenPair::new("bearer-1", "refresh-1")).unwrap();
    let gateway = GraphqlGateway::new(ScriptedTransport::default(), Arc::clone(&session));
    let (store, rx) = TaskStore::new(
        ReconciliationEngine::new(TaskCache::new(kv)),
        Arc::new(gateway),
        Arc::clone(&session),
        StoreConfig::default(),
    );
    (store, rx, session)
}

fn draft() -> TaskDraft {
    TaskDraft {
        title: "Write report".into(),
        due_date: "2025-01-10".into(),
        category: Some(Category::Work),
        ..TaskDraft::default()
    }
}

#[tokio::test]
async fn store_create_commits_server_echo() {
    let (store, mut rx, _) = make_store();
    store.gateway().transport().reply(Ok(GraphqlResponse::with_field(
        "createTask",
        task_json("srv-1", "Write report", "PENDING"),
    )));

    let task = store.create(&draft()).await.unwrap();
    assert_eq!(task.id, TaskId::new("srv-1"));
    assert_eq!(store.tasks().unwrap(), vec![task]);

    let vars = &store.gateway().transport().calls()[0].variables;
    assert_eq!(vars["title"], "Write report");
    assert_eq!(vars["category"], "WORK");
    assert_eq!(vars["priority"], "MEDIUM");
    assert!(vars.get("status").is_none());
    assert!(matches!(
        rx.try_recv().unwrap(),
        Notification::TaskCreated { .. }
    ));
}

#[tokio::test]
async fn store_surfaces_server_field_errors() {
    let (store, _rx, _) = make_store();
    let fields: FieldErrors = [("dueDate", "Due date must be in the future")]
        .into_iter()
        .collect();
    store.gateway().transport().reply(Ok(GraphqlResponse::with_error(
        GraphqlError::new("Validation failed", codes::BAD_USER_INPUT).with_fields(fields.clone()),
    )));

    let err = store.create(&draft()).await.unwrap_err();
    let MutationError::Rejected(gateway_err) = err else {
        panic!("expected a rejected mutation, got {err:?}");
    };
    assert_eq!(gateway_err.field_errors(), Some(&fields));
    assert!(store.tasks().unwrap().is_empty());
}

#[tokio::test]
async fn store_unauthenticated_code_triggers_reauth() {
    let (store, mut rx, session) = make_store();
    store.gateway().transport().reply(Ok(GraphqlResponse::with_error(GraphqlError::new(
        "jwt expired",
        codes::UNAUTHENTICATED,
    ))));

    let err = store.create(&draft()).await.unwrap_err();
    assert_eq!(err, MutationError::ReauthRequired);
    assert!(!session.is_authenticated());
    assert_eq!(rx.try_recv().unwrap(), Notification::ReauthRequired);

    // Later calls go out without a bearer token.
    store
        .gateway()
        .transport()
        .reply(Err(TransportError::Io("refused".into())));
    let _ = store.create(&draft()).await;
    assert!(store.gateway().transport().calls()[1].bearer.is_none());
}
