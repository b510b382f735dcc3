use crate::core::{AppSettings, Campaign, CampaignId};
use crate::library::{Library, LibraryResult};
use crate::playback::player::{PlaybackReport, Player};
use crate::playback::surface::DisplaySurface;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Wait before the single retry of a campaign lookup
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// How a playback session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The campaign does not exist; the caller should go back to its default view
    NotFound,
    Finished(PlaybackReport),
}

/// Look a campaign up, retrying once after `delay` with a fresh read of storage.
///
/// Covers the window where a campaign was just created by another writer
/// and is not in this process's list yet.
pub async fn resolve_campaign(
    library: &mut Library,
    id: &CampaignId,
    delay: Duration,
) -> LibraryResult<Option<Campaign>> {
    if let Some(campaign) = library.campaigns.get(id) {
        return Ok(Some(campaign.clone()));
    }
    info!("Campaign {} not loaded, retrying in {:?}", id, delay);
    tokio::time::sleep(delay).await;
    library.campaigns.reload()?;
    let found = library.campaigns.get(id).cloned();
    if found.is_none() {
        warn!("Campaign {} not found", id);
    }
    Ok(found)
}

/// Campaign to start without user input, if auto-start is on
pub fn launch_target<'a>(settings: &AppSettings, campaigns: &'a [Campaign]) -> Option<&'a Campaign> {
    if !settings.auto_start {
        return None;
    }
    [&settings.startup_campaign_id, &settings.last_played_campaign_id]
        .into_iter()
        .flatten()
        .find_map(|id| campaigns.iter().find(|c| &c.id == id))
}

/// Campaign behind the dashboard's play button: last played, else the first one
pub fn play_target<'a>(settings: &AppSettings, campaigns: &'a [Campaign]) -> Option<&'a Campaign> {
    settings
        .last_played_campaign_id
        .as_ref()
        .and_then(|id| campaigns.iter().find(|c| &c.id == id))
        .or_else(|| campaigns.first())
}

/// Resolve and play a campaign until `cancel` fires
pub async fn play_campaign<S>(
    library: &mut Library,
    id: &CampaignId,
    surface: &mut S,
    cancel: watch::Receiver<bool>,
) -> LibraryResult<SessionOutcome>
where
    S: DisplaySurface + ?Sized,
{
    let Some(campaign) = resolve_campaign(library, id, RETRY_DELAY).await? else {
        return Ok(SessionOutcome::NotFound);
    };

    if let Err(e) = library.settings.record_last_played(&campaign.id) {
        warn!("Could not record last played campaign: {}", e);
    }
    let orientation = library.settings.get().orientation;
    if let Err(e) = surface.set_orientation(orientation).await {
        warn!("Surface {} rejected orientation {}: {}", surface.name(), orientation, e);
    }

    info!("Playing campaign {:?} ({})", campaign.name, campaign.id);
    let mut player = Player::new(campaign.media);
    let report = player.run(surface, &library.campaigns, cancel).await;
    Ok(SessionOutcome::Finished(report))
}
