use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Display durations (seconds) an image item may be configured with
pub const IMAGE_DURATIONS: [u32; 6] = [5, 10, 15, 20, 30, 60];

/// Duration applied to new image items when settings carry none
pub const DEFAULT_IMAGE_DURATION: u32 = 10;

/// Longest item length accepted (seconds): one day
pub const MAX_MEDIA_DURATION: f64 = 86_400.0;

/// Check a value against the enumerated image duration set
pub fn is_valid_image_duration(secs: u32) -> bool {
    IMAGE_DURATIONS.contains(&secs)
}

/// Unique identifier of a media item, assigned at creation and never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of playable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guess the kind from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" => Some(Self::Image),
            "mp4" | "m4v" | "mov" | "webm" | "mkv" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Reference to the binary content of an item, stored in the `media` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Key of the blob in the media namespace
    pub blob_key: String,

    /// Size of the blob in bytes
    pub size: u64,

    /// MIME type, when known at upload time
    #[serde(default)]
    pub mime: Option<String>,
}

/// One playable unit of a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,

    #[serde(alias = "type")]
    pub kind: MediaKind,

    pub content: ContentRef,

    /// Seconds. User-chosen for images, intrinsic length for videos.
    pub duration: f64,
}

impl MediaItem {
    /// Create an image item with the given display duration
    pub fn image(content: ContentRef, duration: u32) -> Self {
        Self {
            id: MediaId::new(),
            kind: MediaKind::Image,
            content,
            duration: f64::from(duration),
        }
    }

    /// Create a video item with its probed length
    pub fn video(content: ContentRef, duration: f64) -> Self {
        Self {
            id: MediaId::new(),
            kind: MediaKind::Video,
            content,
            duration,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Basic shape check applied to records read back from storage
    pub fn is_well_formed(&self) -> bool {
        !self.id.as_str().is_empty()
            && !self.content.blob_key.is_empty()
            && is_valid_media_duration(self.duration)
    }

    /// Image durations must come from the enumerated set
    pub fn has_valid_duration(&self) -> bool {
        match self.kind {
            MediaKind::Image => {
                self.duration.fract() == 0.0
                    && self.duration >= 0.0
                    && self.duration <= f64::from(u32::MAX)
                    && is_valid_image_duration(self.duration as u32)
            }
            MediaKind::Video => is_valid_media_duration(self.duration),
        }
    }

    /// How long the item stays on screen, never panicking on a bad value:
    /// out-of-range lengths are capped at `MAX_MEDIA_DURATION`, and
    /// non-positive or non-finite ones fall back to the default image duration.
    pub fn play_duration(&self) -> Duration {
        let secs = if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.min(MAX_MEDIA_DURATION)
        } else {
            f64::from(DEFAULT_IMAGE_DURATION)
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(u64::from(DEFAULT_IMAGE_DURATION)))
    }
}

/// Item length that playback can schedule
pub fn is_valid_media_duration(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_MEDIA_DURATION
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> ContentRef {
        ContentRef {
            blob_key: "blob".to_string(),
            size: 4,
            mime: None,
        }
    }

    #[test]
    fn test_image_durations() {
        assert!(is_valid_image_duration(5));
        assert!(is_valid_image_duration(60));
        assert!(!is_valid_image_duration(0));
        assert!(!is_valid_image_duration(7));
        assert!(is_valid_image_duration(DEFAULT_IMAGE_DURATION));
    }

    #[test]
    fn test_media_ids_are_unique() {
        let a = MediaItem::image(content(), 5);
        let b = MediaItem::image(content(), 5);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_extension("JPG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("txt"), None);
    }

    #[test]
    fn test_legacy_type_field_accepted() {
        let json = r#"{"id":"a","type":"video","content":{"blob_key":"a","size":1},"duration":12.5}"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, MediaKind::Video);
        assert!(item.is_well_formed());
    }

    #[test]
    fn test_huge_duration_is_malformed_and_capped() {
        let mut item = MediaItem::image(content(), 5);
        item.duration = 1e19;
        assert!(!item.is_well_formed());
        assert_eq!(item.play_duration(), Duration::from_secs(86_400));

        item.duration = -1.0;
        assert_eq!(item.play_duration(), Duration::from_secs(10));
        item.duration = f64::NAN;
        assert_eq!(item.play_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_image_duration_must_be_in_set() {
        let mut item = MediaItem::image(content(), 15);
        assert!(item.has_valid_duration());
        item.duration = 7.0;
        assert!(!item.has_valid_duration());
        item.duration = 15.5;
        assert!(!item.has_valid_duration());

        let video = MediaItem::video(content(), 7.25);
        assert!(video.has_valid_duration());
    }

    #[test]
    fn test_zero_duration_is_malformed() {
        let mut item = MediaItem::video(content(), 3.0);
        item.duration = 0.0;
        assert!(!item.is_well_formed());
    }
}
