//! Liveness and readiness probes.

use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;

/// GET /livez: the process is alive.
pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /readyz: 200 iff the store answers a ping and the engine loop is
/// running; otherwise 503 with per-check status.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let mut checks = BTreeMap::new();

    match state.store.ping().await {
        Ok(()) => {
            checks.insert("database", "ok".to_string());
        }
        Err(err) => {
            checks.insert("database", format!("error: {err}"));
        }
    }

    checks.insert(
        "engine",
        if state.engine.is_running() {
            "ok".to_string()
        } else {
            "not running".to_string()
        },
    );

    let degraded = checks.values().any(|v| v != "ok");
    let (status_code, status) = if degraded {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status_code,
        Json(json!({ "status": status, "checks": checks })),
    )
        .into_response()
}
