//! Whisper model adapter.
//!
//! Wraps the whisper-rs bindings to whisper.cpp behind a small
//! path-in/transcript-out surface. The adapter owns three concerns:
//! resolving a model name to a GGML weights file (downloading it from the
//! ggerganov/whisper.cpp Hugging Face repository when missing), decoding an
//! uploaded audio file to the 16 kHz mono f32 PCM whisper.cpp expects (via
//! an ffmpeg subprocess, the same collaborator the reference Python stack
//! shells out to), and running one greedy full decode.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper's required sample rate.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to download model: {0}")]
    Download(String),
    #[error("Failed to initialize Whisper: {0}")]
    Init(String),
    #[error("Failed to decode audio: {0}")]
    AudioDecode(String),
    #[error("Transcription failed: {0}")]
    Transcription(String),
}

/// A single transcribed span with timing, exactly as the model produced it.
/// Timestamps are in seconds; text keeps the model's surrounding whitespace.
#[derive(Debug, Clone)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Unshaped model output: concatenated text, detected (or forced) language,
/// and segments in playback order.
#[derive(Debug, Clone, Default)]
pub struct RawTranscription {
    pub text: String,
    pub language: Option<String>,
    pub segments: Vec<RawSegment>,
}

/// Get the directory where GGML model files are cached.
pub fn models_dir() -> PathBuf {
    PathBuf::from("models").join("whisper")
}

fn model_filename(name: &str) -> String {
    format!("ggml-{}.bin", name)
}

fn model_url(name: &str) -> String {
    format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_filename(name)
    )
}

/// Resolve a configured model name to a weights file on disk.
///
/// The name may be a filesystem path to an existing GGML file; otherwise it
/// is treated as a whisper.cpp model name ("base", "large-v3", ...) cached
/// under `models/whisper/` and downloaded on first use.
pub fn resolve_model(name: &str) -> Result<PathBuf, WhisperError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let path = models_dir().join(model_filename(name));
    if path.is_file() {
        return Ok(path);
    }

    download_model(name, &path)?;
    Ok(path)
}

/// Download a Whisper model from Hugging Face into the cache directory.
fn download_model(name: &str, path: &Path) -> Result<(), WhisperError> {
    fs::create_dir_all(models_dir())?;

    let url = model_url(name);
    info!("Downloading Whisper model '{}' from {}", name, url);

    let mut response = reqwest::blocking::Client::new()
        .get(&url)
        .send()
        .map_err(|e| WhisperError::Download(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(WhisperError::Download(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = indicatif::ProgressBar::new(total_size);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Stream into a temp name first so a partial download never looks like a
    // usable model file.
    let temp_path = path.with_extension("bin.tmp");
    let file = File::create(&temp_path)?;
    let mut writer = pb.wrap_write(file);

    response
        .copy_to(&mut writer)
        .map_err(|e| WhisperError::Download(format!("Failed to read response: {}", e)))?;

    pb.finish_with_message("Download complete");

    fs::rename(&temp_path, path)?;
    info!("Model downloaded to {:?}", path);

    Ok(())
}

/// Decode any supported audio file to 16 kHz mono f32 samples.
///
/// Shells out to ffmpeg, which is what handles the container/codec zoo
/// (mp3, m4a, flac, ogg, webm, wav) so the model never has to.
fn decode_audio(path: &Path) -> Result<Vec<f32>, WhisperError> {
    let output = Command::new("ffmpeg")
        .args([
            "-nostdin",
            "-threads",
            "0",
            "-i",
            &path.to_string_lossy(),
            "-f",
            "f32le",
            "-ac",
            "1",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-",
        ])
        .output()
        .map_err(|e| WhisperError::AudioDecode(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // ffmpeg is chatty; the last line carries the actual failure
        let reason = stderr.lines().last().unwrap_or("unknown error").trim();
        return Err(WhisperError::AudioDecode(format!(
            "ffmpeg exited with {}: {}",
            output.status, reason
        )));
    }

    let samples = output
        .stdout
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect();

    Ok(samples)
}

/// Loaded whisper.cpp model handle.
///
/// The context is created once and shared read-only across requests; each
/// transcription runs on its own whisper state.
pub struct WhisperModel {
    ctx: WhisperContext,
    n_threads: i32,
}

impl WhisperModel {
    /// Load a Whisper model by name (or weights path).
    pub fn load(name: &str) -> Result<Self, WhisperError> {
        let path = resolve_model(name)?;

        info!("Loading Whisper model '{}' from {:?}", name, path);

        let ctx = WhisperContext::new_with_params(
            &path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| WhisperError::Init(format!("Failed to load model: {}", e)))?;

        // Use available CPU threads (whisper.cpp saturates them during decode)
        let n_threads = std::thread::available_parallelism()
            .map(|p| (p.get() as i32).max(1))
            .unwrap_or(4);

        info!(
            "Whisper model '{}' ready (using {} threads)",
            name, n_threads
        );

        Ok(Self { ctx, n_threads })
    }

    /// Transcribe an audio file, forcing `language` when a hint is present.
    ///
    /// Returns the model's output unshaped: the HTTP-facing trimming and
    /// rounding happen in the engine, not here.
    pub fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscription, WhisperError> {
        let samples = decode_audio(audio_path)?;

        info!(
            "Transcribing {} samples ({:.2}s of audio)",
            samples.len(),
            samples.len() as f64 / WHISPER_SAMPLE_RATE as f64
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);
        params.set_translate(false);

        // A present hint forces the language; otherwise whisper.cpp detects it
        match language {
            Some(lang) => params.set_language(Some(lang)),
            None => params.set_language(Some("auto")),
        }

        // Diagnostics go through tracing, not the library's stderr printer
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| WhisperError::Transcription(format!("Failed to create state: {}", e)))?;

        state
            .full(params, &samples)
            .map_err(|e| WhisperError::Transcription(format!("Inference failed: {}", e)))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| WhisperError::Transcription(format!("Failed to get segments: {}", e)))?;

        let mut segments = Vec::new();
        let mut full_text = String::new();

        for i in 0..num_segments {
            let start_ts = state.full_get_segment_t0(i).map_err(|e| {
                WhisperError::Transcription(format!("Failed to get start time: {}", e))
            })?;
            let end_ts = state.full_get_segment_t1(i).map_err(|e| {
                WhisperError::Transcription(format!("Failed to get end time: {}", e))
            })?;
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| WhisperError::Transcription(format!("Failed to get text: {}", e)))?;

            full_text.push_str(&text);

            // Timestamps are in centiseconds (1/100 second)
            segments.push(RawSegment {
                start: start_ts as f64 / 100.0,
                end: end_ts as f64 / 100.0,
                text,
            });
        }

        // Echo a forced hint back; otherwise report what the model detected
        let detected = match language {
            Some(lang) => Some(lang.to_string()),
            None => state
                .full_lang_id_from_state()
                .ok()
                .and_then(|id| whisper_rs::get_lang_str(id).map(|s| s.to_string())),
        };

        info!(
            "Transcription produced {} segments ({} chars)",
            segments.len(),
            full_text.len()
        );

        Ok(RawTranscription {
            text: full_text,
            language: detected,
            segments,
        })
    }
}
