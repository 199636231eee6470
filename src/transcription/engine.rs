//! # Transcription Engine
//!
//! Owns the process-lifetime Whisper model handle and turns raw model output
//! into the API's response shape.
//!
//! ## Key Responsibilities:
//! - **Lazy model ownership**: the model loads on the first transcription
//!   request and is never reloaded; concurrent first requests are serialized
//!   by the init cell so exactly one load ever runs
//! - **Blocking isolation**: model load and inference are CPU-bound, so both
//!   run on tokio's blocking pool and never stall the HTTP workers
//! - **Result shaping**: trim text, round segment timestamps to 2 decimals,
//!   preserve segment order

use crate::transcription::model::{RawTranscription, WhisperError, WhisperModel};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// A transcribed span of audio in API shape: timestamps rounded to two
/// decimal places, text trimmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Result of a transcription operation, as returned to API clients.
///
/// `language` is the forced hint when one was supplied, the detected
/// language otherwise, and null when detection produced nothing.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

/// Backend contract between the HTTP layer and inference.
///
/// Handlers depend on this trait rather than the concrete engine, so handler
/// tests can substitute a stub and run without model weights on disk.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Configured model name (for status reporting).
    fn model_name(&self) -> &str;

    /// Whether the model handle has been created yet.
    fn is_loaded(&self) -> bool;

    /// Transcribe the audio file at `path`, forcing `language` if present.
    async fn transcribe(
        &self,
        path: &Path,
        language: Option<String>,
    ) -> Result<TranscriptionResult>;
}

/// Inference backend the engine holds behind its init cell.
///
/// `WhisperModel` is the only production implementor; the indirection exists
/// so engine tests can observe the load-once lifecycle without weights.
trait SpeechModel: Send + Sync {
    fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscription, WhisperError>;
}

impl SpeechModel for WhisperModel {
    fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscription, WhisperError> {
        WhisperModel::transcribe(self, audio_path, language)
    }
}

type ModelLoader = dyn Fn(&str) -> Result<Box<dyn SpeechModel>, WhisperError> + Send + Sync;

/// Whisper-backed transcription engine.
///
/// ## Model lifecycle:
/// "not loaded" → "loaded", one-way, no unload. The `OnceCell` both
/// memoizes the handle and serializes racing first requests, which the
/// check-then-set pattern this replaces could not.
pub struct TranscriptionEngine {
    model_name: String,
    loader: Arc<ModelLoader>,
    model: OnceCell<Arc<dyn SpeechModel>>,
}

impl TranscriptionEngine {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self::with_loader(model_name, |name| {
            WhisperModel::load(name).map(|model| Box::new(model) as Box<dyn SpeechModel>)
        })
    }

    fn with_loader(
        model_name: impl Into<String>,
        loader: impl Fn(&str) -> Result<Box<dyn SpeechModel>, WhisperError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            loader: Arc::new(loader),
            model: OnceCell::new(),
        }
    }

    /// Get the shared model handle, loading it on first use.
    ///
    /// Loading resolves (and possibly downloads) the weights file, which can
    /// take minutes for the large models; it happens on the blocking pool.
    async fn model(&self) -> Result<&Arc<dyn SpeechModel>> {
        self.model
            .get_or_try_init(|| async {
                let name = self.model_name.clone();
                let loader = Arc::clone(&self.loader);
                let model = tokio::task::spawn_blocking(move || loader(&name))
                    .await
                    .map_err(|e| anyhow!("model load task failed: {}", e))??;
                Ok(Arc::from(model))
            })
            .await
    }
}

#[async_trait]
impl Transcriber for TranscriptionEngine {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn transcribe(
        &self,
        path: &Path,
        language: Option<String>,
    ) -> Result<TranscriptionResult> {
        let model = Arc::clone(self.model().await?);

        if let Some(lang) = &language {
            info!("Using language override: {}", lang);
        }

        let audio_path: PathBuf = path.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || {
            model.transcribe(&audio_path, language.as_deref())
        })
        .await
        .map_err(|e| anyhow!("transcription task failed: {}", e))??;

        Ok(shape_result(raw))
    }
}

/// Round to two decimal places, half away from zero.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shape raw model output into the API contract.
///
/// Trims the overall text and each segment's text, rounds timestamps, and
/// keeps segments exactly in the order the model produced them. Empty text
/// and zero segments are valid outputs, not errors.
fn shape_result(raw: RawTranscription) -> TranscriptionResult {
    let segments = raw
        .segments
        .into_iter()
        .map(|segment| Segment {
            start: round2(segment.start),
            end: round2(segment.end),
            text: segment.text.trim().to_string(),
        })
        .collect();

    TranscriptionResult {
        text: raw.text.trim().to_string(),
        language: raw.language,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::model::RawSegment;

    fn raw(segments: Vec<RawSegment>) -> RawTranscription {
        RawTranscription {
            text: "  hello world  ".to_string(),
            language: Some("en".to_string()),
            segments,
        }
    }

    #[test]
    fn test_shaping_trims_and_rounds() {
        let shaped = shape_result(raw(vec![RawSegment {
            start: 1.005,
            end: 2.0,
            text: " hi ".to_string(),
        }]));

        assert_eq!(shaped.text, "hello world");
        assert_eq!(shaped.language, Some("en".to_string()));
        assert_eq!(shaped.segments.len(), 1);
        let segment = &shaped.segments[0];
        // 1.005 has no exact binary representation; either neighbor is fine
        assert!(segment.start == 1.0 || segment.start == 1.01);
        assert_eq!(segment.end, 2.0);
        assert_eq!(segment.text, "hi");
    }

    #[test]
    fn test_shaping_preserves_order() {
        let shaped = shape_result(raw(vec![
            RawSegment {
                start: 0.0,
                end: 1.234,
                text: " first".to_string(),
            },
            RawSegment {
                start: 1.236,
                end: 2.5,
                text: " second".to_string(),
            },
            RawSegment {
                start: 2.5,
                end: 3.999,
                text: " third".to_string(),
            },
        ]));

        let texts: Vec<&str> = shaped
            .segments
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(shaped.segments[0].end, 1.23);
        assert_eq!(shaped.segments[1].start, 1.24);
        assert_eq!(shaped.segments[2].end, 4.0);
    }

    #[test]
    fn test_shaping_empty_output_is_valid() {
        let shaped = shape_result(RawTranscription::default());
        assert_eq!(shaped.text, "");
        assert_eq!(shaped.language, None);
        assert!(shaped.segments.is_empty());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(-1.006), -1.01);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_engine_starts_unloaded() {
        let engine = TranscriptionEngine::new("base");
        assert_eq!(engine.model_name(), "base");
        assert!(!engine.is_loaded());
    }

    struct CannedModel;

    impl SpeechModel for CannedModel {
        fn transcribe(
            &self,
            _audio_path: &Path,
            language: Option<&str>,
        ) -> Result<RawTranscription, WhisperError> {
            Ok(RawTranscription {
                text: "ok".to_string(),
                language: language.map(str::to_string),
                segments: Vec::new(),
            })
        }
    }

    /// Racing first requests must produce exactly one model load.
    #[tokio::test]
    async fn test_concurrent_first_calls_load_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let engine = Arc::new(TranscriptionEngine::with_loader("base", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so all callers arrive mid-load
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Box::new(CannedModel) as Box<dyn SpeechModel>)
        }));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(
                    async move { engine.transcribe(Path::new("unused.wav"), None).await },
                )
            })
            .collect();

        for task in tasks {
            let result = task.await.unwrap();
            assert_eq!(result.unwrap().text, "ok");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(engine.is_loaded());
    }

    #[test]
    fn test_result_serializes_to_contract_shape() {
        let shaped = shape_result(raw(vec![RawSegment {
            start: 0.0,
            end: 1.5,
            text: " hi ".to_string(),
        }]));
        let json = serde_json::to_value(&shaped).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "hello world",
                "language": "en",
                "segments": [{"start": 0.0, "end": 1.5, "text": "hi"}]
            })
        );
    }
}
