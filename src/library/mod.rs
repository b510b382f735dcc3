pub mod campaigns;
pub mod editor;
pub mod error;
pub mod probe;
pub mod settings;

pub use campaigns::CampaignStore;
pub use editor::{Editor, EditorSelection};
pub use error::{LibraryError, LibraryResult, Notice, Operation};
pub use probe::{FixedProbe, MediaProbe, Mp4Probe, ProbeError};
pub use settings::{SettingsStore, SETTINGS_KEY};

use crate::core::{CampaignId, MediaItem, MediaKind};
use crate::storage::SharedStore;

/// Campaign and settings services, constructed once at startup and passed
/// to whichever surface (dashboard, editor, player) needs them
pub struct Library {
    pub campaigns: CampaignStore,
    pub settings: SettingsStore,
}

impl Library {
    pub fn open(store: SharedStore, probe: Box<dyn MediaProbe>) -> LibraryResult<Self> {
        let settings = SettingsStore::open(store.clone());
        let campaigns = CampaignStore::open(store, probe)?;
        Ok(Self { campaigns, settings })
    }

    /// Append content to a campaign, seeding image durations from settings
    pub fn add_media(
        &mut self,
        id: &CampaignId,
        kind: MediaKind,
        data: &[u8],
        mime: Option<String>,
    ) -> LibraryResult<MediaItem> {
        let duration = self.settings.get().image_duration();
        self.campaigns.add_media(id, kind, data, mime, duration)
    }

    /// Delete a campaign and clear settings that point at it
    pub fn delete_campaign(&mut self, id: &CampaignId) -> LibraryResult<()> {
        self.campaigns.delete(id)?;
        self.settings.forget_campaign(id)
    }
}
