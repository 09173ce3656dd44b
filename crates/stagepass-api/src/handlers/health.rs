//! Health and readiness probes

use axum::Json;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readiness_check() -> Json<Value> {
    // State is in-process; if we can answer, we can serve
    Json(json!({ "status": "ready" }))
}
