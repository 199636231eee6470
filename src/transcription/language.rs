//! Language hint normalization.
//!
//! Callers (and the process-wide default) can name a language in whatever
//! shape they like; the model wants a small, canonical vocabulary. This
//! function is pure and total: any input string produces a valid hint, and
//! unrecognized values pass through lowercased/trimmed for the model to
//! interpret.

/// Normalize a caller-supplied language hint, falling back to the configured
/// default when the request carries none.
///
/// ## Rules:
/// - absent or empty `raw` → fall back to `default` (recursively normalized)
/// - trim whitespace, lowercase
/// - `"auto"` / `"default"` → `None` (auto-detect)
/// - `"id"` / `"indo"` / `"bahasa"` → `"indonesian"`
/// - `"en"` / `"eng"` → `"english"`
/// - anything else passes through unchanged
pub fn normalize_language(raw: Option<&str>, default: Option<&str>) -> Option<String> {
    let hint = match raw {
        Some(value) if !value.trim().is_empty() => value,
        _ => default?,
    };

    let hint = hint.trim().to_lowercase();
    match hint.as_str() {
        "" | "auto" | "default" => None,
        "id" | "indo" | "bahasa" => Some("indonesian".to_string()),
        "en" | "eng" => Some("english".to_string()),
        _ => Some(hint),
    }
}
