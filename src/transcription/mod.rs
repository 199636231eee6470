//! # Transcription Module
//!
//! Handles speech-to-text transcription using Whisper models via the
//! whisper-rs bindings to whisper.cpp.
//!
//! ## Key Components:
//! - **Language normalization**: Mapping caller-supplied hints to the model's vocabulary
//! - **Transcription Engine**: Lazy model ownership and result shaping
//! - **Model Adapter**: GGML model resolution, audio decoding, inference
//!
//! The HTTP layer depends on the [`Transcriber`] trait instead of the
//! concrete engine, which keeps request handling decoupled from inference
//! code and lets handler tests run without model weights.

pub mod engine;
pub mod language;
pub mod model;

pub use engine::{Segment, Transcriber, TranscriptionEngine, TranscriptionResult};
pub use language::normalize_language;
