//! In-process storefront backend for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use futures::StreamExt;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use storefront_core::session::SessionStore;
use storefront_core::{ApiClient, ClientConfig};

pub const PASSWORD: &str = "rahasia";
/// Notification id the backend refuses to acknowledge.
pub const FAILING_ID: &str = "13";

/// Signed token carrying `user_id` and `role`.
pub fn mint_token(user_id: i64, role: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    jsonwebtoken::encode(
        &Header::default(),
        &json!({ "user_id": user_id, "role": role, "exp": exp }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("mint token")
}

/// What the backend has observed.
#[derive(Debug, Default)]
pub struct Seen {
    pub event_queries: Vec<HashMap<String, String>>,
    pub event_auth: Vec<Option<String>>,
    pub acked: Vec<String>,
    pub order_auth: Vec<Option<String>>,
}

#[derive(Clone)]
pub struct Backend {
    pub push: broadcast::Sender<String>,
    pub seen: Arc<Mutex<Seen>>,
    /// Number of `/events` connections accepted so far.
    pub connections: Arc<AtomicUsize>,
    /// When set, each `/events` connection sends `{"message":"conn<N>"}`
    /// with a short `retry` hint and then ends.
    pub one_event_per_connection: Arc<AtomicBool>,
}

impl Backend {
    /// Push one raw SSE `data` payload to every open stream.
    pub fn send(&self, data: &str) {
        self.push.send(data.to_string()).expect("no stream subscribers");
    }
}

/// Start the backend on an ephemeral port. Returns its base URL.
pub async fn spawn_backend() -> (String, Backend) {
    let (push, _) = broadcast::channel(16);
    let backend = Backend {
        push,
        seen: Arc::new(Mutex::new(Seen::default())),
        connections: Arc::new(AtomicUsize::new(0)),
        one_event_per_connection: Arc::new(AtomicBool::new(false)),
    };

    let app = Router::new()
        .route("/api/login", post(login))
        .route("/api/users/{id}", get(user))
        .route("/api/users/{id}/is-active", get(is_active))
        .route("/api/notification", get(notifications))
        .route("/api/notification/admin", get(admin_notifications))
        .route("/api/notification/{id}/read", patch(ack))
        .route("/api/orders", post(create_order))
        .route("/events", get(events))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), backend)
}

/// Client with an in-memory session pointed at `base_url`.
pub fn client(base_url: &str) -> ApiClient {
    let config = ClientConfig::new(base_url, "integration-key");
    let session = Arc::new(SessionStore::in_memory(&config.secret_key));
    ApiClient::new(config, session)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized" })),
    )
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == PASSWORD {
        (
            StatusCode::OK,
            Json(json!({ "message": "Login berhasil", "token": mint_token(7, "user") })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Nomor HP atau password salah" })),
        )
    }
}

async fn user(Path(id): Path<String>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "data": {
                "user": {
                    "id": id.parse::<i64>().unwrap_or_default(),
                    "name": "Ari",
                    "phone": "08123",
                    "district": "Sleman"
                },
                "token": mint_token(7, "admin")
            }
        })),
    )
}

async fn is_active(Path(id): Path<String>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({ "data": { "is_active": id == "7" } })),
    )
}

async fn notifications(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let user_id = query.get("user_id").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": [
                { "id": 12, "message": format!("Pesanan untuk {user_id}"), "is_read": false,
                  "created_at": "2024-05-01T10:00:00Z",
                  "order": { "id": 3, "order_code": "ORD-3", "user_name": "Ari", "qty": 2 } },
                { "ID": FAILING_ID, "text": "Order diproses", "isRead": false,
                  "createdAt": "2024-05-01 09:00:00" },
                { "_id": "11", "message": "Order selesai", "read": true, "time": 1_714_550_000_000_i64 }
            ]
        })),
    )
}

async fn admin_notifications(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": [
                { "id": 21, "message": "Pesanan baru", "read": false },
                { "id": 20, "message": "Pesanan dibatalkan", "read": true }
            ]
        })),
    )
}

async fn ack(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    if id == FAILING_ID {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Database unavailable" })),
        );
    }
    backend.seen.lock().unwrap().acked.push(id);
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

/// Rejects orders without a positive quantity with an empty message.
async fn create_order(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.seen.lock().unwrap().order_auth.push(bearer(&headers));
    if body["quantity"].as_i64().is_none_or(|q| q <= 0) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "" })));
    }
    let mut user = body["user"].clone();
    if user.get("id").is_none_or(|id| id == "") {
        user["id"] = json!(7);
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Order berhasil dibuat",
            "data": {
                "order": { "id": 100, "order_code": "ORD-100", "quantity": body["quantity"] },
                "user": user
            }
        })),
    )
}

async fn events(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Sse<futures::stream::BoxStream<'static, Result<Event, Infallible>>> {
    {
        let mut seen = backend.seen.lock().unwrap();
        seen.event_queries.push(query);
        seen.event_auth.push(bearer(&headers));
    }
    let n = backend.connections.fetch_add(1, Ordering::SeqCst);

    if backend.one_event_per_connection.load(Ordering::SeqCst) {
        let event = Event::default()
            .retry(Duration::from_millis(100))
            .data(format!(r#"{{"message":"conn{n}"}}"#));
        return Sse::new(futures::stream::iter([Ok(event)]).boxed());
    }

    let rx = backend.push.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(data) => return Some((Ok::<_, Infallible>(Event::default().data(data)), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream.boxed())
}
