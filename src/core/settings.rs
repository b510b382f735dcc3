use crate::core::campaign::CampaignId;
use crate::core::media::{is_valid_image_duration, DEFAULT_IMAGE_DURATION};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rotation applied to the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
    ReverseLandscape,
    ReversePortrait,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Landscape,
        Orientation::Portrait,
        Orientation::ReverseLandscape,
        Orientation::ReversePortrait,
    ];

    /// Clockwise rotation in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Orientation::Landscape => 0,
            Orientation::Portrait => 90,
            Orientation::ReverseLandscape => 180,
            Orientation::ReversePortrait => 270,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::ReverseLandscape => "reverse-landscape",
            Orientation::ReversePortrait => "reverse-portrait",
        };
        f.write_str(name)
    }
}

/// Process-wide player settings
///
/// Stored records are merged over the defaults, so fields missing from an
/// older record keep their default value. Legacy camelCase field names are
/// accepted on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub orientation: Orientation,

    /// Seed duration (seconds) for newly inserted image items
    #[serde(alias = "defaultImageDuration")]
    pub default_image_duration: u32,

    /// Start playback automatically when the player launches
    #[serde(alias = "autoStart")]
    pub auto_start: bool,

    /// Ask the host to launch the player at system boot (device dependent)
    #[serde(alias = "startOnBoot")]
    pub start_on_boot: bool,

    /// Campaign launched at startup when `auto_start` is set
    #[serde(alias = "startupCampaignId")]
    pub startup_campaign_id: Option<CampaignId>,

    /// Most recently played campaign, fallback for auto-start and the Play button
    #[serde(alias = "lastPlayedCampaignId")]
    pub last_played_campaign_id: Option<CampaignId>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            orientation: Orientation::Landscape,
            default_image_duration: DEFAULT_IMAGE_DURATION,
            auto_start: false,
            start_on_boot: false,
            startup_campaign_id: None,
            last_played_campaign_id: None,
        }
    }
}

impl AppSettings {
    /// Duration for new images, falling back to the default when the stored value is off the set
    pub fn image_duration(&self) -> u32 {
        if is_valid_image_duration(self.default_image_duration) {
            self.default_image_duration
        } else {
            DEFAULT_IMAGE_DURATION
        }
    }
}
