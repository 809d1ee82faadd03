//! Inbound webhook receiver
//!
//! Accepts update payloads pushed by the platform, verifies the shared
//! secret when one is configured, and buffers updates in a bounded
//! in-memory queue (oldest dropped on overflow). Consumers drain the
//! queue; nothing is persisted.

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const QUEUE_CAP: usize = 1000;

/// Bounded in-memory update queue.
pub struct UpdateQueue {
    updates: Mutex<VecDeque<Value>>,
    secret: Option<String>,
}

impl UpdateQueue {
    pub fn new(secret: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            updates: Mutex::new(VecDeque::new()),
            secret,
        })
    }

    /// Append an update; the oldest entry is dropped at capacity.
    pub async fn push(&self, update: Value) {
        let mut updates = self.updates.lock().await;
        if updates.len() >= QUEUE_CAP {
            updates.pop_front();
            warn!("update queue full, dropping oldest");
        }
        updates.push_back(update);
    }

    /// Pop up to `n` updates in arrival order.
    pub async fn drain(&self, n: usize) -> Vec<Value> {
        let mut updates = self.updates.lock().await;
        let take = n.min(updates.len());
        updates.drain(..take).collect()
    }

    pub async fn pending(&self) -> usize {
        self.updates.lock().await.len()
    }

    fn secret_matches(&self, headers: &HeaderMap) -> bool {
        match &self.secret {
            None => true,
            Some(expected) => headers
                .get(SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == expected)
                .unwrap_or(false),
        }
    }
}

/// Single fallback handler implementing the receiver's routing table:
/// `POST /` and `POST /webhook` accept updates, `GET /health` reports
/// queue depth, wrong verbs on known paths get 405, the rest 404.
async fn receiver(
    State(queue): State<Arc<UpdateQueue>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path();

    if path == "/" || path == "/webhook" {
        if method != Method::POST {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }

        if !queue.secret_matches(&headers) {
            warn!("webhook update rejected: bad secret token");
            return StatusCode::UNAUTHORIZED.into_response();
        }

        let update: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                debug!("webhook update rejected: {}", e);
                return (StatusCode::BAD_REQUEST, "invalid JSON").into_response();
            }
        };

        queue.push(update).await;
        return Json(json!({"ok": true})).into_response();
    }

    if path == "/health" {
        if method != Method::GET {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }
        let pending = queue.pending().await;
        return Json(json!({"ok": true, "pending": pending})).into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Build the receiver router.
pub fn webhook_router(queue: Arc<UpdateQueue>) -> axum::Router {
    axum::Router::new().fallback(receiver).with_state(queue)
}

/// Serve the receiver until the process exits.
pub async fn serve(queue: Arc<UpdateQueue>, port: u16) -> anyhow::Result<()> {
    let router = webhook_router(queue);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("webhook receiver listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
