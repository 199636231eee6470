//! # Application State Management
//!
//! Shared state that every HTTP request handler can access. The
//! transcription engine is constructed once at startup and injected here,
//! which makes its one-way "not loaded → loaded" lifecycle visible instead
//! of hiding it behind a global.
//!
//! ## Thread Safety Pattern:
//! - `Arc<dyn Transcriber>`: shared ownership of the engine; read-only after
//!   construction (its internal lazy-init cell handles first-use loading)
//! - `Arc<RwLock<AppMetrics>>`: counters updated by middleware and handlers;
//!   multiple readers or one writer at a time
//! - `Instant`: server start time, never changes, safe to copy around

use crate::config::AppConfig;
use crate::transcription::Transcriber;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, immutable after startup
    pub config: AppConfig,

    /// The transcription backend; handlers only see the trait
    pub engine: Arc<dyn Transcriber>,

    /// Request/transcription counters (constantly updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses (4xx/5xx) since server start
    pub error_count: u64,

    /// Transcriptions that completed successfully
    pub transcriptions_completed: u64,

    /// Transcriptions that failed during inference
    pub transcriptions_failed: u64,
}

impl AppState {
    /// Create a new AppState around an explicitly constructed engine.
    pub fn new(config: AppConfig, engine: Arc<dyn Transcriber>) -> Self {
        Self {
            config,
            engine,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called for any 4xx/5xx response).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record the outcome of a transcription attempt.
    pub fn record_transcription(&self, success: bool) {
        let mut metrics = self.metrics.write().unwrap();
        if success {
            metrics.transcriptions_completed += 1;
        } else {
            metrics.transcriptions_failed += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /health endpoint).
    ///
    /// Cloning releases the lock immediately so the response serialization
    /// never holds it.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap().clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptionEngine;

    fn test_state() -> AppState {
        let engine = Arc::new(TranscriptionEngine::new("base"));
        AppState::new(AppConfig::default(), engine)
    }

    #[test]
    fn test_counters() {
        let state = test_state();
        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_transcription(true);
        state.record_transcription(false);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.transcriptions_completed, 1);
        assert_eq!(snapshot.transcriptions_failed, 1);
    }

    #[test]
    fn test_engine_injected_not_loaded() {
        let state = test_state();
        assert_eq!(state.engine.model_name(), "base");
        assert!(!state.engine.is_loaded());
    }
}
