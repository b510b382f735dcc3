use crate::core::{CampaignId, MediaId};
use crate::library::probe::ProbeError;
use crate::storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for playlist store operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Failures of campaign and settings operations
///
/// None of these are fatal: the operation is abandoned, prior state is kept,
/// and the editing surface shows the matching `Notice`.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    #[error("Media item not found: {0}")]
    MediaNotFound(MediaId),

    #[error("Media content missing: {0}")]
    ContentMissing(String),

    #[error("Invalid campaign {0}: {1}")]
    InvalidCampaign(CampaignId, String),

    #[error("Invalid image duration: {0}s")]
    InvalidDuration(u32),

    #[error("Duration of {0} items is not editable")]
    NotEditable(crate::core::MediaKind),

    #[error("Media probe failed: {0}")]
    Probe(#[from] ProbeError),
}

/// Transient notification for the editing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub description: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Which operation failed, to pick the notice wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Save,
    Delete,
    AddMedia,
}

impl LibraryError {
    pub fn is_storage(&self) -> bool {
        matches!(self, LibraryError::Storage(_) | LibraryError::Poisoned)
    }

    /// Notification to show for this failure
    pub fn notice(&self, op: Operation) -> Notice {
        let (title, description) = match (op, self) {
            (_, LibraryError::Probe(_)) => (
                "Unsupported Media",
                "Could not read the video's metadata.".to_string(),
            ),
            (_, LibraryError::InvalidDuration(secs)) => (
                "Invalid Duration",
                format!("{} seconds is not an available display duration.", secs),
            ),
            (_, LibraryError::InvalidCampaign(..)) => (
                "Save Failed",
                "The campaign contains invalid media entries.".to_string(),
            ),
            (Operation::Load, _) => ("Load Failed", "Could not load campaign data.".to_string()),
            (Operation::Create, _) => ("Save Failed", "Could not create new campaign.".to_string()),
            (Operation::Delete, _) => ("Delete Failed", "Could not delete campaign.".to_string()),
            (Operation::Save | Operation::AddMedia, e) if e.is_storage() => (
                "Storage Error",
                "Could not save campaign changes. The storage may be full.".to_string(),
            ),
            (Operation::Save | Operation::AddMedia, e) => ("Save Failed", e.to_string()),
        };
        Notice { title, description }
    }
}
