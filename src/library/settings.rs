use crate::core::{AppSettings, CampaignId};
use crate::library::error::{LibraryError, LibraryResult};
use crate::storage::{get_record, put_record, Namespace, SharedStore};
use tracing::{info, warn};

/// Fixed key of the settings record
pub const SETTINGS_KEY: &str = "app-settings";

/// Loads and persists the single `AppSettings` record
pub struct SettingsStore {
    store: SharedStore,
    settings: AppSettings,
}

impl SettingsStore {
    /// Load settings, falling back to defaults when the record is missing or unreadable
    pub fn open(store: SharedStore) -> Self {
        let loaded = match store.lock() {
            Ok(guard) => get_record::<AppSettings>(&*guard, Namespace::Settings, SETTINGS_KEY),
            Err(_) => {
                warn!("Settings store lock poisoned, using defaults");
                Ok(None)
            }
        };
        let settings = match loaded {
            Ok(Some(settings)) => settings,
            Ok(None) => AppSettings::default(),
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        };
        Self { store, settings }
    }

    pub fn get(&self) -> &AppSettings {
        &self.settings
    }

    /// Apply a change and persist it. On failure the previous settings stay in effect.
    pub fn update<F>(&mut self, change: F) -> LibraryResult<&AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut updated = self.settings.clone();
        change(&mut updated);
        if updated == self.settings {
            return Ok(&self.settings);
        }
        {
            let mut guard = self.store.lock().map_err(|_| LibraryError::Poisoned)?;
            put_record(&mut *guard, Namespace::Settings, SETTINGS_KEY, &updated).map_err(|e| {
                warn!("Failed to save settings: {}", e);
                e
            })?;
        }
        info!("Settings updated: {:?}", updated);
        self.settings = updated;
        Ok(&self.settings)
    }

    /// Remember the campaign that was last started
    pub fn record_last_played(&mut self, id: &CampaignId) -> LibraryResult<()> {
        self.update(|s| s.last_played_campaign_id = Some(id.clone()))?;
        Ok(())
    }

    /// Drop references to a campaign that no longer exists
    pub fn forget_campaign(&mut self, id: &CampaignId) -> LibraryResult<()> {
        self.update(|s| {
            if s.last_played_campaign_id.as_ref() == Some(id) {
                s.last_played_campaign_id = None;
            }
            if s.startup_campaign_id.as_ref() == Some(id) {
                s.startup_campaign_id = None;
            }
        })?;
        Ok(())
    }
}
