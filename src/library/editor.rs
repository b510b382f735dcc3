use crate::core::{Campaign, CampaignId, MediaId, MediaItem, MediaKind};
use crate::library::error::{LibraryError, LibraryResult};
use crate::library::Library;
use tracing::debug;

/// Which item of a campaign the editing surface has selected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSelection {
    selected: Option<MediaId>,
}

impl EditorSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&MediaId> {
        self.selected.as_ref()
    }

    /// Select an item if it belongs to the campaign
    pub fn select(&mut self, campaign: &Campaign, item: &MediaId) -> bool {
        if campaign.item(item).is_some() {
            self.selected = Some(item.clone());
            true
        } else {
            false
        }
    }

    /// Keep the selection pointing at an existing item: the first item when
    /// nothing (or a vanished item) is selected, none when the campaign is empty
    pub fn reconcile(&mut self, campaign: &Campaign) {
        let still_there = self
            .selected
            .as_ref()
            .is_some_and(|id| campaign.item(id).is_some());
        if !still_there {
            self.selected = campaign.media.first().map(|m| m.id.clone());
        }
    }
}

/// Editing session over one campaign
///
/// Wraps the store operations the editing surface uses and keeps the
/// selection consistent after each of them. Closing a session on a
/// campaign that never got any media discards it as an abandoned draft.
#[derive(Debug)]
pub struct Editor {
    campaign: CampaignId,
    selection: EditorSelection,
}

impl Editor {
    pub fn open(library: &Library, id: &CampaignId) -> LibraryResult<Self> {
        let campaign = library
            .campaigns
            .get(id)
            .ok_or_else(|| LibraryError::CampaignNotFound(id.clone()))?;
        let mut selection = EditorSelection::new();
        selection.reconcile(campaign);
        Ok(Self {
            campaign: id.clone(),
            selection,
        })
    }

    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign
    }

    pub fn selected(&self) -> Option<&MediaId> {
        self.selection.selected()
    }

    pub fn select(&mut self, library: &Library, item: &MediaId) -> bool {
        match library.campaigns.get(&self.campaign) {
            Some(campaign) => self.selection.select(campaign, item),
            None => false,
        }
    }

    /// Upload content into the campaign using the settings' default image duration
    pub fn add(
        &mut self,
        library: &mut Library,
        kind: MediaKind,
        data: &[u8],
        mime: Option<String>,
    ) -> LibraryResult<MediaItem> {
        let item = library.add_media(&self.campaign, kind, data, mime)?;
        self.refresh(library);
        Ok(item)
    }

    pub fn remove(&mut self, library: &mut Library, item: &MediaId) -> LibraryResult<MediaItem> {
        let removed = library.campaigns.remove_media(&self.campaign, item)?;
        self.refresh(library);
        Ok(removed)
    }

    pub fn move_up(&mut self, library: &mut Library, index: usize) -> LibraryResult<bool> {
        library.campaigns.move_up(&self.campaign, index)
    }

    pub fn move_down(&mut self, library: &mut Library, index: usize) -> LibraryResult<bool> {
        library.campaigns.move_down(&self.campaign, index)
    }

    /// Change the duration of the selected image. Returns false when
    /// nothing is selected (nothing changed).
    pub fn set_selected_duration(&mut self, library: &mut Library, secs: u32) -> LibraryResult<bool> {
        let Some(item) = self.selection.selected().cloned() else {
            debug!("No item selected, duration unchanged");
            return Ok(false);
        };
        library.campaigns.set_image_duration(&self.campaign, &item, secs)?;
        Ok(true)
    }

    /// End the session. Returns true if the campaign was discarded as an empty draft.
    pub fn close(self, library: &mut Library) -> LibraryResult<bool> {
        let discarded = library.campaigns.discard_if_empty(&self.campaign)?;
        if discarded {
            debug!("Editor closed on empty campaign {}, discarded", self.campaign);
            library.settings.forget_campaign(&self.campaign)?;
        }
        Ok(discarded)
    }

    fn refresh(&mut self, library: &Library) {
        if let Some(campaign) = library.campaigns.get(&self.campaign) {
            self.selection.reconcile(campaign);
        }
    }
}
