pub mod media;
pub mod campaign;
pub mod settings;

pub use media::{ContentRef, MediaId, MediaItem, MediaKind, IMAGE_DURATIONS, DEFAULT_IMAGE_DURATION, MAX_MEDIA_DURATION};
pub use campaign::{Campaign, CampaignId, next_campaign_name};
pub use settings::{AppSettings, Orientation};
