use crate::core::media::{MediaId, MediaItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a campaign
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CampaignId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A named, ordered playlist of media items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,

    /// Display label, unique only at creation time
    pub name: String,

    /// Playback order
    #[serde(default)]
    pub media: Vec<MediaItem>,

    /// Records written before timestamps existed read as the Unix epoch
    #[serde(default = "legacy_created_at")]
    pub created_at: DateTime<Utc>,
}

fn legacy_created_at() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Campaign {
    /// Create an empty campaign with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CampaignId::new(),
            name: name.into(),
            media: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    /// Position of an item in playback order
    pub fn position_of(&self, item: &MediaId) -> Option<usize> {
        self.media.iter().position(|m| &m.id == item)
    }

    pub fn item(&self, item: &MediaId) -> Option<&MediaItem> {
        self.media.iter().find(|m| &m.id == item)
    }

    pub fn item_mut(&mut self, item: &MediaId) -> Option<&mut MediaItem> {
        self.media.iter_mut().find(|m| &m.id == item)
    }

    /// Swap two items. Returns false (and changes nothing) if either index is out of bounds.
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.media.len() || b >= self.media.len() {
            return false;
        }
        self.media.swap(a, b);
        true
    }

    /// Remove an item, returning it if it was present
    pub fn remove_item(&mut self, item: &MediaId) -> Option<MediaItem> {
        let pos = self.position_of(item)?;
        Some(self.media.remove(pos))
    }

    /// Basic shape check applied to records read back from storage
    pub fn is_well_formed(&self) -> bool {
        if self.id.as_str().is_empty() {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.media.len());
        self.media
            .iter()
            .all(|m| m.is_well_formed() && seen.insert(m.id.clone()))
    }
}

/// Format the auto-generated name for a campaign number
pub fn campaign_name(number: usize) -> String {
    format!("Campaign {:02}", number)
}

/// Generate a name for a new campaign that collides with none of `existing`.
///
/// Numbering starts after the current campaign count and moves up until a
/// free name is found.
pub fn next_campaign_name<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let names: HashSet<&str> = existing.into_iter().collect();
    let mut number = names.len() + 1;
    loop {
        let candidate = campaign_name(number);
        if !names.contains(candidate.as_str()) {
            return candidate;
        }
        number += 1;
    }
}
