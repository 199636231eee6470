//! Health check endpoint.
//!
//! Reports service identity, uptime, the request/transcription counters,
//! and whether the Whisper model has been loaded yet.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "whisper-upload-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": state.config.server.host,
            "port": state.config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "transcriptions_completed": metrics.transcriptions_completed,
            "transcriptions_failed": metrics.transcriptions_failed
        },
        "model": {
            "name": state.engine.model_name(),
            "status": if state.engine.is_loaded() { "loaded" } else { "not_loaded" },
            "default_language": state.config.model.language
        }
    }))
}
