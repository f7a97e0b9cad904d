//! Integration tests for the HTTP clients against an embedded axum backend.
//!
//! The backend mimics the task store and reward authority closely
//! enough to exercise paths, query strings, bodies and error details.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

use taskmint::claim::ClaimError;
use taskmint::remote::rest::{RestRewardAuthority, RestTaskStore};
use taskmint::remote::{RemoteError, RewardAuthority, TaskStore};
use taskmint_proto::identity::Address;
use taskmint_proto::task::{NewTask, TaskFilter, TaskId};

const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
const MALLORY: &str = "0x00000000000000000000000000000000000bad00";
const SLOW: &str = "0x0000000000000000000000000000000000005104";

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Backend {
    next_id: u64,
    todos: Vec<Value>,
}

type Shared = Arc<Mutex<Backend>>;

#[derive(Deserialize)]
struct ListParams {
    completed: Option<bool>,
}

fn detail(status: StatusCode, detail: impl Into<Value>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

async fn list(State(db): State<Shared>, Query(params): Query<ListParams>) -> Json<Vec<Value>> {
    let db = db.lock();
    Json(
        db.todos
            .iter()
            .filter(|t| params.completed.is_none_or(|c| t["completed"] == c))
            .cloned()
            .collect(),
    )
}

async fn create(State(db): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(text) = body["text"].as_str() else {
        return detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["body", "text"], "msg": "field required", "type": "value_error.missing" }]),
        );
    };
    let mut db = db.lock();
    if db.todos.iter().any(|t| t["text"] == text && t["owner"] == body["owner"]) {
        return detail(StatusCode::BAD_REQUEST, "Todo with this text already exists");
    }
    db.next_id += 1;
    let todo = json!({
        "id": db.next_id,
        "text": text,
        "completed": false,
        "owner": body["owner"],
    });
    db.todos.push(todo.clone());
    (StatusCode::CREATED, Json(todo)).into_response()
}

fn update(db: &Shared, id: u64, field: &str, value: Value) -> Response {
    let mut db = db.lock();
    match db.todos.iter_mut().find(|t| t["id"] == id) {
        Some(todo) => {
            todo[field] = value;
            Json(todo.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Todo not found"),
    }
}

async fn set_completed(State(db): State<Shared>, Path(id): Path<u64>, Json(body): Json<Value>) -> Response {
    update(&db, id, "completed", body["completed"].clone())
}

async fn set_text(State(db): State<Shared>, Path(id): Path<u64>, Json(body): Json<Value>) -> Response {
    update(&db, id, "text", body["text"].clone())
}

async fn remove(State(db): State<Shared>, Path(id): Path<u64>) -> Response {
    let mut db = db.lock();
    let before = db.todos.len();
    db.todos.retain(|t| t["id"] != id);
    if db.todos.len() == before {
        return detail(StatusCode::NOT_FOUND, "Todo not found");
    }
    Json(json!({ "message": "Todo deleted" })).into_response()
}

async fn nft_status(Path(address): Path<String>) -> Response {
    if address == SLOW {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    // `claim_available` disagrees with `claimable_count` on purpose.
    Json(json!({
        "completed_count": 12,
        "claimed_milestone": 0,
        "unit_size": 10,
        "claimable_count": 1,
        "claim_available": false,
    }))
    .into_response()
}

async fn claim_nft(Path(address): Path<String>) -> Response {
    if address == MALLORY {
        return detail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "execution reverted: Ownable: caller is not the owner",
        );
    }
    Json(json!({ "transaction_hash": "0xfeedbeef" })).into_response()
}

async fn start_backend() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/todos", get(list).post(create))
        .route("/todos/{id}", patch(set_completed).put(set_text).delete(remove))
        .route("/nft-status/{address}", get(nft_status))
        .route("/claim-nft/{address}", post(claim_nft))
        .with_state(Shared::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, handle)
}

fn alice() -> Address {
    Address::parse(ALICE).unwrap()
}

// ---------------------------------------------------------------------------
// Task store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_crud_round_trip() {
    let (addr, server) = start_backend().await;
    let store = RestTaskStore::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    let created = store
        .create(&NewTask {
            text: "water plants".to_string(),
            owner: alice(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, TaskId::new("1"));
    assert_eq!(created.owner, alice());
    assert!(!created.completed);

    let second = store
        .create(&NewTask {
            text: "feed the cat".to_string(),
            owner: alice(),
        })
        .await
        .unwrap();

    let toggled = store.set_completed(&created.id, true).await.unwrap();
    assert!(toggled.completed);

    assert_eq!(store.list(TaskFilter::All).await.unwrap().len(), 2);
    let done = store.list(TaskFilter::Completed).await.unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, created.id);
    let active = store.list(TaskFilter::Active).await.unwrap();
    assert_eq!(active[0].id, second.id);

    let renamed = store.set_text(&second.id, "feed both cats").await.unwrap();
    assert_eq!(renamed.text, "feed both cats");

    store.delete(&created.id).await.unwrap();
    assert_eq!(store.list(TaskFilter::All).await.unwrap().len(), 1);

    server.abort();
}

#[tokio::test]
async fn error_detail_is_surfaced_verbatim() {
    let (addr, server) = start_backend().await;
    let store = RestTaskStore::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let task = NewTask {
        text: "water plants".to_string(),
        owner: alice(),
    };
    store.create(&task).await.unwrap();

    let err = store.create(&task).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Rejected {
            status: 400,
            detail: "Todo with this text already exists".to_string()
        }
    );
    assert_eq!(err.user_message(), "Todo with this text already exists");

    let err = store.delete(&TaskId::new("99")).await.unwrap_err();
    assert_eq!(err.user_message(), "Todo not found");

    server.abort();
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let (addr, server) = start_backend().await;
    server.abort();
    let _ = server.await;

    let store = RestTaskStore::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let err = store.list(TaskFilter::All).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
    assert_eq!(err.user_message(), "Something went wrong talking to the server");
}

// ---------------------------------------------------------------------------
// Reward authority
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_rederives_claim_flag() {
    let (addr, server) = start_backend().await;
    let authority = RestRewardAuthority::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    let snapshot = authority.progress(&alice()).await.unwrap();
    assert_eq!(snapshot.completed_count(), 12);
    assert_eq!(snapshot.claimable_count(), 1);
    assert!(snapshot.claim_available());
    assert_eq!(snapshot.tasks_until_next(), 8);

    server.abort();
}

#[tokio::test]
async fn claim_receipt_and_failure() {
    let (addr, server) = start_backend().await;
    let authority = RestRewardAuthority::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();

    let receipt = authority.claim(&alice()).await.unwrap();
    assert_eq!(receipt.transaction_hash.as_str(), "0xfeedbeef");

    let err = authority
        .claim(&Address::parse(MALLORY).unwrap())
        .await
        .unwrap_err();
    assert_eq!(ClaimError::classify(err), ClaimError::NotAuthorized);

    server.abort();
}

#[tokio::test]
async fn slow_response_times_out() {
    let (addr, server) = start_backend().await;
    let authority =
        RestRewardAuthority::new(&format!("http://{addr}"), Duration::from_millis(200)).unwrap();

    let err = authority
        .progress(&Address::parse(SLOW).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, RemoteError::Timeout);
    assert_eq!(ClaimError::classify(err), ClaimError::Timeout);

    server.abort();
}
