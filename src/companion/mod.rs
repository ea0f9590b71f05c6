//! Reference receiver for delivered context
//!
//! A minimal stand-in for the companion application: it accepts record
//! updates, answers liveness probes and publishes the current record to
//! observers. Useful for local testing of the extension side and as the
//! executable contract of the delivery target.

use crate::error::{BridgeError, Result};
use crate::metadata::MetadataRecord;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Latest context received, with change notification
#[derive(Debug)]
pub struct ContextStore {
    tx: watch::Sender<Option<MetadataRecord>>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn update(&self, record: MetadataRecord) {
        log::info!("Context updated: {:?}", record);
        self.tx.send_replace(Some(record));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<MetadataRecord> {
        self.tx.borrow().clone()
    }

    /// Observer channel; sees every later update
    pub fn subscribe(&self) -> watch::Receiver<Option<MetadataRecord>> {
        self.tx.subscribe()
    }
}

/// Routes of the delivery contract
pub fn router(store: Arc<ContextStore>) -> Router {
    Router::new()
        .route("/update_context", post(update_context))
        .route("/health", get(health))
        .with_state(store)
}

async fn update_context(State(store): State<Arc<ContextStore>>, body: Bytes) -> (StatusCode, Json<Value>) {
    let received: Option<Value> = serde_json::from_slice(&body).ok().filter(|v: &Value| match v {
        Value::Object(map) => !map.is_empty(),
        _ => false,
    });

    let Some(received) = received else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No data provided"})),
        );
    };

    match serde_json::from_value::<MetadataRecord>(received.clone()) {
        Ok(record) if record.is_contextless() => {
            log::info!("Contextless update from {}, clearing context", record.url);
            store.clear();
            (StatusCode::OK, Json(json!({"status": "ok", "received": received})))
        }
        Ok(record) => {
            store.update(record);
            (StatusCode::OK, Json(json!({"status": "ok", "received": received})))
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": e.to_string()})),
        ),
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "running"}))
}

/// Bind the first candidate port that is free, in ascending order
pub async fn bind_first_free(host: &str, candidates: &[u16]) -> Result<(TcpListener, u16)> {
    let mut ports = candidates.to_vec();
    ports.sort_unstable();

    for port in ports {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if Some(&port) != candidates.iter().min() {
                    log::info!("Lower ports busy, companion using port {}", port);
                }
                return Ok((listener, port));
            }
            Err(e) => log::debug!("Port {} unavailable: {}", port, e),
        }
    }

    Err(BridgeError::Config(format!(
        "Could not find an available port among {:?}",
        candidates
    )))
}

/// Serve the receiver on an already bound listener until the task is dropped
pub async fn serve(listener: TcpListener, store: Arc<ContextStore>) -> Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}
