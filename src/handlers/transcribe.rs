//! # Transcription Upload Handler
//!
//! `POST /transcribe` — the single real endpoint of this service. Accepts a
//! multipart form with a required `audio` file field and an optional
//! `language` text field, runs the upload through the transcription engine,
//! and returns the shaped transcript as JSON.
//!
//! ## Request lifecycle:
//! 1. Walk the multipart fields. The audio field is validated (filename
//!    present, extension allow-listed) before a single byte is written.
//! 2. Stream the upload into a `NamedTempFile` whose suffix is preserved
//!    from the original filename. The running byte count across all fields
//!    is capped by `upload.limit`; exceeding it is a 413, never a 500.
//! 3. Normalize the language hint (request field, falling back to the
//!    configured default).
//! 4. Delegate to the engine and serialize the result.
//!
//! The temp file is deleted on every exit path: `NamedTempFile` removes
//! itself on drop, and removal failures are ignored, so early `?` returns,
//! inference errors, and success all clean up identically.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::transcription::normalize_language;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// File extensions the endpoint accepts, compared case-insensitively.
const ALLOWED_EXTENSIONS: [&str; 6] = ["mp3", "wav", "m4a", "flac", "ogg", "webm"];

fn allowed_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Handle `POST /transcribe`.
pub async fn transcribe(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let limit = state.config.upload.limit;
    let mut received: usize = 0;

    let mut upload: Option<(NamedTempFile, String)> = None;
    let mut language_field: Option<String> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart payload: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("audio") => {
                // First audio part wins; later duplicates are drained unvalidated
                if upload.is_some() {
                    drain_field(&mut field, limit, &mut received).await?;
                    continue;
                }

                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("")
                    .to_string();

                if filename.is_empty() {
                    return Err(AppError::BadRequest("Empty filename".to_string()));
                }
                if !allowed_file(&filename) {
                    return Err(AppError::BadRequest("Unsupported file type".to_string()));
                }

                let temp = save_to_temp(&mut field, &filename, limit, &mut received).await?;
                upload = Some((temp, filename));
            }
            Some("language") => {
                language_field = Some(read_text_field(&mut field, limit, &mut received).await?);
            }
            _ => {
                // Unknown fields still count toward the body limit
                drain_field(&mut field, limit, &mut received).await?;
            }
        }
    }

    let (temp, filename) = upload
        .ok_or_else(|| AppError::BadRequest("No audio file provided".to_string()))?;

    let language = normalize_language(
        language_field.as_deref(),
        state.config.model.language.as_deref(),
    );

    info!(
        "Starting transcription for {} with model '{}'",
        filename,
        state.engine.model_name()
    );

    let result = state.engine.transcribe(temp.path(), language).await;
    state.record_transcription(result.is_ok());
    let result = result.map_err(|e| AppError::Transcription(e.to_string()))?;

    info!("Completed transcription for {}", filename);

    Ok(HttpResponse::Ok().json(result))
    // `temp` drops here (and on every error path above), deleting the file
}

/// Stream an upload field into a temp file, preserving the original suffix.
///
/// The suffix matters: the decoding collaborator sniffs containers better
/// with the extension intact, mirroring how the upload arrived.
async fn save_to_temp(
    field: &mut Field,
    filename: &str,
    limit: usize,
    received: &mut usize,
) -> AppResult<NamedTempFile> {
    let suffix = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    let mut temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile()?;

    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        *received += chunk.len();
        if *received > limit {
            return Err(payload_too_large(limit));
        }
        temp.as_file_mut().write_all(&chunk)?;
    }

    temp.as_file_mut().flush()?;
    Ok(temp)
}

/// Read a small text field (the language hint) into a String.
async fn read_text_field(
    field: &mut Field,
    limit: usize,
    received: &mut usize,
) -> AppResult<String> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read form field: {}", e)))?
    {
        *received += chunk.len();
        if *received > limit {
            return Err(payload_too_large(limit));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Consume and discard a field we don't care about.
async fn drain_field(field: &mut Field, limit: usize, received: &mut usize) -> AppResult<()> {
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read form field: {}", e)))?
    {
        *received += chunk.len();
        if *received > limit {
            return Err(payload_too_large(limit));
        }
    }
    Ok(())
}

fn payload_too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!("Upload exceeds the {} byte limit", limit))
}
