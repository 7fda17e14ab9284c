use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use waypost_model::CarrierId;

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut health = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "started_at": state.started_at().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "live": { "active_feeds": state.live().active_feeds() },
        }
    });

    // Any lookup proves the route store answers.
    let probe = state
        .coordinator()
        .stores()
        .routes
        .carrier(CarrierId::new())
        .await;
    let status = match probe {
        Ok(_) => {
            health["checks"]["store"] = json!({ "status": "healthy" });
            StatusCode::OK
        }
        Err(err) => {
            tracing::warn!(error = %err, "health check store probe failed");
            health["checks"]["store"] = json!({
                "status": "unhealthy",
                "error": err.to_string(),
            });
            health["status"] = json!("unhealthy");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(health))
}
