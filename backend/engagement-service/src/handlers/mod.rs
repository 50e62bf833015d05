/// HTTP handlers for the engagement endpoints
///
/// - content: like toggles, view submissions, metadata (single and batch)
/// - playback: playback session lifecycle
pub mod content;
pub mod playback;

use uuid::Uuid;

use crate::error::AppError;
use crate::services::{CounterCache, LikeService, PlaybackService, ViewService};

// Re-export handler functions at module level
pub use content::{batch_metadata, get_metadata, record_view, toggle_like};
pub use playback::{end_playback, pause_playback, progress_playback, resume_playback, start_playback};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub likes: LikeService,
    pub views: ViewService,
    pub playback: PlaybackService,
    pub cache: CounterCache,
}

/// Validate a content-type path segment. Content modules register types as
/// short lowercase identifiers (media, song, post, playlist, ...).
pub fn parse_content_type(raw: &str) -> Result<String, AppError> {
    let valid = !raw.is_empty()
        && raw.len() <= 32
        && raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(raw.to_string())
    } else {
        Err(AppError::InvalidIdentifier(format!(
            "invalid content type: {raw}"
        )))
    }
}

/// Parse a content/session id path segment or reject with 400.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidIdentifier(format!("invalid {what}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_accepts_registered_shapes() {
        assert!(parse_content_type("media").is_ok());
        assert!(parse_content_type("prayer_post").is_ok());
        assert!(parse_content_type("playlist2").is_ok());
    }

    #[test]
    fn content_type_rejects_malformed_segments() {
        assert!(parse_content_type("").is_err());
        assert!(parse_content_type("Media").is_err());
        assert!(parse_content_type("a b").is_err());
        assert!(parse_content_type(&"x".repeat(33)).is_err());
    }

    #[test]
    fn id_parse_rejects_non_uuid() {
        assert!(parse_id("not-a-uuid", "content id").is_err());
        assert!(parse_id("b2f7a6cb-3f5c-4a85-9d53-1d32bd0a2f60", "content id").is_ok());
    }
}
