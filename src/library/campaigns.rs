use crate::core::{
    campaign::next_campaign_name, media::is_valid_image_duration, Campaign, CampaignId,
    ContentRef, MediaId, MediaItem, MediaKind,
};
use crate::library::error::{LibraryError, LibraryResult};
use crate::library::probe::MediaProbe;
use crate::storage::{load_records, put_record, KeyValueStore, Namespace, SharedStore, StorageResult};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Durable CRUD over campaigns and their media
///
/// Every mutating call writes the full campaign record before the in-memory
/// copy changes. If the write fails the call returns the error and the
/// in-memory state is left exactly as it was.
pub struct CampaignStore {
    store: SharedStore,
    probe: Box<dyn MediaProbe>,
    campaigns: Vec<Campaign>,
}

impl CampaignStore {
    /// Load all campaigns from storage, dropping records that fail the shape check
    pub fn open(store: SharedStore, probe: Box<dyn MediaProbe>) -> LibraryResult<Self> {
        let mut this = Self {
            store,
            probe,
            campaigns: Vec::new(),
        };
        this.reload()?;
        Ok(this)
    }

    /// Re-read every campaign from storage
    pub fn reload(&mut self) -> LibraryResult<()> {
        let mut campaigns: Vec<Campaign> = self.with_store(|s| {
            load_records(&*s, Namespace::Campaigns, |key, c: &Campaign| {
                c.id.as_str() == key && c.is_well_formed()
            })
        })?;
        campaigns.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        info!("Loaded {} campaigns", campaigns.len());
        self.campaigns = campaigns;
        Ok(())
    }

    /// All campaigns in creation order
    pub fn list(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn get(&self, id: &CampaignId) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CampaignId) -> bool {
        self.get(id).is_some()
    }

    /// Create an empty campaign with an auto-generated, collision-free name
    pub fn create(&mut self) -> LibraryResult<Campaign> {
        let name = next_campaign_name(self.campaigns.iter().map(|c| c.name.as_str()));
        let campaign = Campaign::new(name);
        self.persist(&campaign)?;
        info!("Created campaign {:?} ({})", campaign.name, campaign.id);
        self.campaigns.push(campaign.clone());
        Ok(campaign)
    }

    /// Replace a stored campaign wholesale (last writer wins).
    ///
    /// The record must satisfy the same checks as records loaded from
    /// storage, and image durations must come from the enumerated set;
    /// otherwise nothing is written. Content blobs of items absent from the
    /// new record are deleted after the record itself is written.
    pub fn update(&mut self, campaign: Campaign) -> LibraryResult<&Campaign> {
        validate(&campaign)?;
        let current = self
            .get(&campaign.id)
            .ok_or_else(|| LibraryError::CampaignNotFound(campaign.id.clone()))?;

        let kept: HashSet<&str> = campaign
            .media
            .iter()
            .map(|m| m.content.blob_key.as_str())
            .collect();
        let orphaned: Vec<String> = current
            .media
            .iter()
            .filter(|m| !kept.contains(m.content.blob_key.as_str()))
            .map(|m| m.content.blob_key.clone())
            .collect();

        let id = campaign.id.clone();
        self.commit(campaign)?;
        for key in orphaned {
            self.release_blob(&key);
        }
        self.get(&id).ok_or(LibraryError::CampaignNotFound(id))
    }

    /// Rename a campaign. Names are not re-checked for uniqueness.
    pub fn rename(&mut self, id: &CampaignId, name: impl Into<String>) -> LibraryResult<&Campaign> {
        let mut campaign = self.cloned(id)?;
        campaign.name = name.into();
        self.commit(campaign)
    }

    /// Delete a campaign and its content. Deleting an absent id is not an error.
    pub fn delete(&mut self, id: &CampaignId) -> LibraryResult<()> {
        let key = id.as_str().to_string();
        self.with_store(|s| s.delete(Namespace::Campaigns, &key))?;

        if let Some(pos) = self.campaigns.iter().position(|c| &c.id == id) {
            let campaign = self.campaigns.remove(pos);
            for item in &campaign.media {
                self.release_blob(&item.content.blob_key);
            }
            info!("Deleted campaign {:?} ({})", campaign.name, campaign.id);
        }
        Ok(())
    }

    /// Delete a campaign that still has no media (abandoned draft).
    /// Returns true if it was deleted.
    pub fn discard_if_empty(&mut self, id: &CampaignId) -> LibraryResult<bool> {
        match self.get(id) {
            Some(campaign) if campaign.is_empty() => {
                debug!("Discarding empty draft {}", id);
                self.delete(id)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Append one item built from raw content.
    ///
    /// Images get `image_duration` seconds; videos are probed for their
    /// intrinsic length. A video whose length cannot be read is rejected
    /// and nothing is stored.
    pub fn add_media(
        &mut self,
        id: &CampaignId,
        kind: MediaKind,
        data: &[u8],
        mime: Option<String>,
        image_duration: u32,
    ) -> LibraryResult<MediaItem> {
        let mut campaign = self.cloned(id)?;

        let media_id = MediaId::new();
        let content = ContentRef {
            blob_key: media_id.as_str().to_string(),
            size: data.len() as u64,
            mime,
        };
        let item = match kind {
            MediaKind::Image => {
                if !is_valid_image_duration(image_duration) {
                    return Err(LibraryError::InvalidDuration(image_duration));
                }
                MediaItem {
                    id: media_id,
                    kind,
                    content,
                    duration: f64::from(image_duration),
                }
            }
            MediaKind::Video => {
                let duration = self.probe.video_duration(data).map_err(|e| {
                    warn!("Rejecting video for campaign {}: {}", id, e);
                    e
                })?;
                MediaItem {
                    id: media_id,
                    kind,
                    content,
                    duration,
                }
            }
        };

        let blob_key = item.content.blob_key.clone();
        self.with_store(|s| s.put(Namespace::Media, &blob_key, data))?;

        campaign.media.push(item.clone());
        if let Err(e) = self.commit(campaign).map(|_| ()) {
            self.release_blob(&blob_key);
            return Err(e);
        }
        info!(
            "Added {} {} ({:.1}s, {} bytes) to campaign {}",
            item.kind,
            item.id,
            item.duration,
            data.len(),
            id
        );
        Ok(item)
    }

    /// Swap two items. Out-of-range indices make this a no-op (returns false, nothing written).
    pub fn reorder(&mut self, id: &CampaignId, a: usize, b: usize) -> LibraryResult<bool> {
        let mut campaign = self.cloned(id)?;
        if !campaign.swap(a, b) {
            debug!("Ignoring reorder {}<->{} on campaign {} ({} items)", a, b, id, campaign.len());
            return Ok(false);
        }
        self.commit(campaign)?;
        Ok(true)
    }

    /// Move the item at `index` one place earlier
    pub fn move_up(&mut self, id: &CampaignId, index: usize) -> LibraryResult<bool> {
        match index.checked_sub(1) {
            Some(target) => self.reorder(id, index, target),
            None => Ok(false),
        }
    }

    /// Move the item at `index` one place later
    pub fn move_down(&mut self, id: &CampaignId, index: usize) -> LibraryResult<bool> {
        self.reorder(id, index, index + 1)
    }

    /// Remove an item and its content
    pub fn remove_media(&mut self, id: &CampaignId, item: &MediaId) -> LibraryResult<MediaItem> {
        let mut campaign = self.cloned(id)?;
        let removed = campaign
            .remove_item(item)
            .ok_or_else(|| LibraryError::MediaNotFound(item.clone()))?;
        self.commit(campaign)?;
        self.release_blob(&removed.content.blob_key);
        info!("Removed {} {} from campaign {}", removed.kind, removed.id, id);
        Ok(removed)
    }

    /// Change the display duration of an image item
    pub fn set_image_duration(
        &mut self,
        id: &CampaignId,
        item: &MediaId,
        secs: u32,
    ) -> LibraryResult<&Campaign> {
        let mut campaign = self.cloned(id)?;
        let target = campaign
            .item_mut(item)
            .ok_or_else(|| LibraryError::MediaNotFound(item.clone()))?;
        if target.kind != MediaKind::Image {
            return Err(LibraryError::NotEditable(target.kind));
        }
        if !is_valid_image_duration(secs) {
            return Err(LibraryError::InvalidDuration(secs));
        }
        target.duration = f64::from(secs);
        self.commit(campaign)
    }

    /// Read an item's binary content
    pub fn load_content(&self, item: &MediaItem) -> LibraryResult<Vec<u8>> {
        let key = item.content.blob_key.clone();
        self.with_store(|s| s.get(Namespace::Media, &key))?
            .ok_or(LibraryError::ContentMissing(key))
    }

    fn cloned(&self, id: &CampaignId) -> LibraryResult<Campaign> {
        self.get(id)
            .cloned()
            .ok_or_else(|| LibraryError::CampaignNotFound(id.clone()))
    }

    /// Write the record, then swap it into memory
    fn commit(&mut self, campaign: Campaign) -> LibraryResult<&Campaign> {
        self.persist(&campaign)?;
        let pos = self
            .campaigns
            .iter()
            .position(|c| c.id == campaign.id)
            .ok_or_else(|| LibraryError::CampaignNotFound(campaign.id.clone()))?;
        self.campaigns[pos] = campaign;
        Ok(&self.campaigns[pos])
    }

    fn persist(&self, campaign: &Campaign) -> LibraryResult<()> {
        let key = campaign.id.as_str().to_string();
        self.with_store(|s| put_record(s, Namespace::Campaigns, &key, campaign))
            .map_err(|e| {
                warn!("Failed to persist campaign {}: {}", campaign.id, e);
                e
            })
    }

    /// Best-effort blob removal; a leftover blob is only wasted space
    fn release_blob(&self, key: &str) {
        if let Err(e) = self.with_store(|s| s.delete(Namespace::Media, key)) {
            warn!("Failed to delete media blob {}: {}", key, e);
        }
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut dyn KeyValueStore) -> StorageResult<T>,
    ) -> LibraryResult<T> {
        let mut guard = self.store.lock().map_err(|_| LibraryError::Poisoned)?;
        Ok(f(&mut *guard)?)
    }
}

/// Reject records that playback or the load path would not accept
fn validate(campaign: &Campaign) -> LibraryResult<()> {
    let invalid = |reason: String| {
        warn!("Rejecting update of campaign {}: {}", campaign.id, reason);
        Err(LibraryError::InvalidCampaign(campaign.id.clone(), reason))
    };
    let mut seen = HashSet::with_capacity(campaign.media.len());
    for item in &campaign.media {
        if !seen.insert(&item.id) {
            return invalid(format!("duplicate media id {}", item.id));
        }
        if !item.is_well_formed() || !item.has_valid_duration() {
            return invalid(format!("{} {} has invalid duration {}", item.kind, item.id, item.duration));
        }
    }
    if !campaign.is_well_formed() {
        return invalid("malformed record".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::probe::{FixedProbe, ProbeError};
    use crate::storage::{shared, FailureSwitch, MemoryStore};

    fn open() -> (CampaignStore, FailureSwitch, SharedStore) {
        let mem = MemoryStore::new();
        let switch = mem.failure_switch();
        let store = shared(mem);
        let campaigns = CampaignStore::open(store.clone(), Box::new(FixedProbe(42.0))).unwrap();
        (campaigns, switch, store)
    }

    fn with_images(store: &mut CampaignStore, n: usize) -> CampaignId {
        let id = store.create().unwrap().id;
        for i in 0..n {
            store
                .add_media(&id, MediaKind::Image, &[i as u8], Some("image/png".into()), 10)
                .unwrap();
        }
        id
    }

    #[test]
    fn test_create_generates_next_name() {
        let (mut store, _, _) = open();
        for _ in 0..3 {
            store.create().unwrap();
        }
        let names: Vec<_> = store.list().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Campaign 01", "Campaign 02", "Campaign 03"]);
        assert_eq!(store.create().unwrap().name, "Campaign 04");
    }

    #[test]
    fn test_create_failure_is_noop() {
        let (mut store, switch, _) = open();
        switch.fail_writes(true);
        assert!(store.create().unwrap_err().is_storage());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_campaigns_survive_reopen() {
        let (mut store, _, backing) = open();
        let id = with_images(&mut store, 2);
        let reopened = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        assert_eq!(reopened.get(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_update_failure_keeps_previous_value() {
        let (mut store, switch, backing) = open();
        let id = with_images(&mut store, 1);
        let before = store.get(&id).unwrap().clone();

        let mut edited = before.clone();
        edited.name = "Renamed".to_string();
        edited.media.clear();

        switch.fail_writes(true);
        assert!(store.update(edited).is_err());
        assert_eq!(store.get(&id).unwrap(), &before);

        // Re-read from storage: still the old record, blob still present
        switch.fail_writes(false);
        let reopened = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        let stored = reopened.get(&id).unwrap();
        assert_eq!(stored, &before);
        assert!(reopened.load_content(&stored.media[0]).is_ok());
    }

    #[test]
    fn test_update_drops_orphaned_blobs() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 2);
        let mut edited = store.get(&id).unwrap().clone();
        let dropped = edited.media.remove(0);

        store.update(edited).unwrap();
        assert!(matches!(
            store.load_content(&dropped),
            Err(LibraryError::ContentMissing(_))
        ));
    }

    #[test]
    fn test_update_unknown_campaign() {
        let (mut store, _, _) = open();
        let stray = Campaign::new("stray");
        assert!(matches!(store.update(stray), Err(LibraryError::CampaignNotFound(_))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 1);
        let item = store.get(&id).unwrap().media[0].clone();
        store.delete(&id).unwrap();
        store.delete(&id).unwrap();
        assert!(store.get(&id).is_none());
        assert!(store.load_content(&item).is_err());
    }

    #[test]
    fn test_add_media_durations() {
        let (mut store, _, _) = open();
        let id = store.create().unwrap().id;
        let image = store.add_media(&id, MediaKind::Image, b"img", None, 15).unwrap();
        let video = store.add_media(&id, MediaKind::Video, b"vid", None, 15).unwrap();
        assert_eq!(image.duration, 15.0);
        assert_eq!(video.duration, 42.0);
        assert_eq!(store.load_content(&video).unwrap(), b"vid".to_vec());
    }

    #[test]
    fn test_unreadable_video_is_rejected() {
        let mem = MemoryStore::new();
        let mut store = CampaignStore::open(shared(mem), Box::new(FixedProbe(0.0))).unwrap();
        let id = store.create().unwrap().id;
        let err = store.add_media(&id, MediaKind::Video, b"??", None, 10).unwrap_err();
        assert!(matches!(err, LibraryError::Probe(_)));
        assert!(store.get(&id).unwrap().is_empty());
    }

    #[test]
    fn test_add_media_failure_rolls_back_blob() {
        let (mut store, switch, backing) = open();
        let id = store.create().unwrap().id;
        switch.fail_writes(true);
        assert!(store.add_media(&id, MediaKind::Image, b"x", None, 10).is_err());
        switch.fail_writes(false);
        assert!(store.get(&id).unwrap().is_empty());
        let blobs = backing.lock().unwrap().get_all(Namespace::Media).unwrap();
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_reorder_and_bounds() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 3);
        let order: Vec<MediaId> = store.get(&id).unwrap().media.iter().map(|m| m.id.clone()).collect();

        assert!(!store.reorder(&id, 0, 3).unwrap());
        assert!(!store.move_up(&id, 0).unwrap());
        assert!(!store.move_down(&id, 2).unwrap());

        assert!(store.move_down(&id, 0).unwrap());
        let now: Vec<MediaId> = store.get(&id).unwrap().media.iter().map(|m| m.id.clone()).collect();
        assert_eq!(now, vec![order[1].clone(), order[0].clone(), order[2].clone()]);

        assert!(store.move_up(&id, 2).unwrap());
        let now: Vec<MediaId> = store.get(&id).unwrap().media.iter().map(|m| m.id.clone()).collect();
        assert_eq!(now, vec![order[1].clone(), order[2].clone(), order[0].clone()]);
    }

    #[test]
    fn test_set_image_duration_rules() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 1);
        let video = store.add_media(&id, MediaKind::Video, b"v", None, 10).unwrap();
        let image = store.get(&id).unwrap().media[0].id.clone();

        let updated = store.set_image_duration(&id, &image, 30).unwrap();
        assert_eq!(updated.media[0].duration, 30.0);
        assert!(matches!(
            store.set_image_duration(&id, &image, 31),
            Err(LibraryError::InvalidDuration(31))
        ));
        assert!(matches!(
            store.set_image_duration(&id, &video.id, 5),
            Err(LibraryError::NotEditable(MediaKind::Video))
        ));
    }

    #[test]
    fn test_discard_if_empty() {
        let (mut store, _, _) = open();
        let draft = store.create().unwrap().id;
        let full = with_images(&mut store, 1);
        assert!(store.discard_if_empty(&draft).unwrap());
        assert!(!store.discard_if_empty(&full).unwrap());
        assert!(!store.discard_if_empty(&draft).unwrap());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_malformed_records_dropped_on_load() {
        let mem = MemoryStore::new();
        let backing = shared(mem);
        {
            let mut s = backing.lock().unwrap();
            s.put(Namespace::Campaigns, "broken", br#"{"name":"no id"}"#).unwrap();
            s.put(
                Namespace::Campaigns,
                "zero",
                br#"{"id":"zero","name":"Zero","media":[{"id":"m","kind":"image","content":{"blob_key":"m","size":1},"duration":0}]}"#,
            )
            .unwrap();
            s.put(Namespace::Campaigns, "ok", br#"{"id":"ok","name":"Fine","media":[]}"#).unwrap();
        }
        let store = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].name, "Fine");
    }

    fn assert_rejected(store: &mut CampaignStore, edited: Campaign) {
        assert!(matches!(
            store.update(edited),
            Err(LibraryError::InvalidCampaign(..))
        ));
    }

    #[test]
    fn test_update_rejects_duplicate_item_ids() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 1);
        let mut edited = store.get(&id).unwrap().clone();
        let copy = edited.media[0].clone();
        edited.media.push(copy);
        assert_rejected(&mut store, edited);
        assert_eq!(store.get(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_rejects_non_positive_durations() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 1);
        store.add_media(&id, MediaKind::Video, b"v", None, 10).unwrap();

        for bad in [0.0, -1.0, f64::NAN, 1e19] {
            let mut edited = store.get(&id).unwrap().clone();
            edited.media[1].duration = bad;
            assert_rejected(&mut store, edited);
        }
        assert_eq!(store.get(&id).unwrap().media[1].duration, 42.0);
    }

    #[test]
    fn test_update_rejects_off_set_image_duration() {
        let (mut store, _, _) = open();
        let id = with_images(&mut store, 1);
        let mut edited = store.get(&id).unwrap().clone();
        edited.media[0].duration = 7.0;
        assert_rejected(&mut store, edited);

        let mut edited = store.get(&id).unwrap().clone();
        edited.media[0].duration = 30.0;
        store.update(edited).unwrap();
        assert_eq!(store.get(&id).unwrap().media[0].duration, 30.0);
    }

    #[test]
    fn test_rejected_update_is_not_persisted() {
        let (mut store, _, backing) = open();
        let id = with_images(&mut store, 2);
        let before = store.get(&id).unwrap().clone();
        let writes = {
            let guard = backing.lock().unwrap();
            guard.get(Namespace::Campaigns, id.as_str()).unwrap()
        };

        let mut edited = before.clone();
        edited.name = "Renamed".to_string();
        edited.media[0].duration = -1.0;
        edited.media.remove(1);
        assert_rejected(&mut store, edited);

        assert_eq!(store.get(&id).unwrap(), &before);
        {
            let guard = backing.lock().unwrap();
            assert_eq!(guard.get(Namespace::Campaigns, id.as_str()).unwrap(), writes);
        }
        let reopened = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        let stored = reopened.get(&id).unwrap();
        assert_eq!(stored, &before);
        // the blob of the item the rejected record dropped is still there
        assert!(reopened.load_content(&stored.media[1]).is_ok());
    }

    #[test]
    fn test_record_under_foreign_key_dropped_on_load() {
        let backing = shared(MemoryStore::new());
        {
            let mut s = backing.lock().unwrap();
            s.put(Namespace::Campaigns, "a", br#"{"id":"b","name":"Misfiled","media":[]}"#).unwrap();
            s.put(Namespace::Campaigns, "c", br#"{"id":"c","name":"Filed","media":[]}"#).unwrap();
        }
        let store = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].name, "Filed");
    }

    #[test]
    fn test_legacy_records_keep_their_order_across_reloads() {
        let backing = shared(MemoryStore::new());
        {
            let mut s = backing.lock().unwrap();
            for key in ["zeta", "alpha", "mid"] {
                let record = format!(r#"{{"id":"{}","name":"{}","media":[]}}"#, key, key);
                s.put(Namespace::Campaigns, key, record.as_bytes()).unwrap();
            }
        }
        let mut store = CampaignStore::open(backing, Box::new(FixedProbe(1.0))).unwrap();
        let first: Vec<String> = store.list().iter().map(|c| c.name.clone()).collect();
        assert_eq!(first, vec!["alpha", "mid", "zeta"]);

        store.reload().unwrap();
        let second: Vec<String> = store.list().iter().map(|c| c.name.clone()).collect();
        assert_eq!(first, second);
        assert!(store.list().iter().all(|c| c.created_at == store.list()[0].created_at));
    }

    #[test]
    fn test_overlong_video_is_rejected() {
        let backing = shared(MemoryStore::new());
        let mut store = CampaignStore::open(backing, Box::new(FixedProbe(1e19))).unwrap();
        let id = store.create().unwrap().id;
        assert!(matches!(
            store.add_media(&id, MediaKind::Video, b"v", None, 10),
            Err(LibraryError::Probe(ProbeError::TooLong(_)))
        ));
        assert!(store.get(&id).unwrap().is_empty());
    }
}
