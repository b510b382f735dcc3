use crate::core::{MediaId, MediaItem, MediaKind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Issues temporary handles onto item content and counts the live ones
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<AtomicUsize>,
    issued: Arc<AtomicU64>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a handle on an item's decoded content
    pub fn acquire(&self, item: &MediaItem, data: Vec<u8>) -> ContentHandle {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:signage/{}/{}", item.id, serial);
        debug!("Acquired {}", url);
        ContentHandle {
            url,
            item: item.id.clone(),
            kind: item.kind,
            data: data.into(),
            live: self.live.clone(),
        }
    }

    /// Handles acquired and not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Handles ever acquired
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

/// Temporary handle onto the content of the active item
///
/// Invalidated when released or dropped.
#[derive(Debug)]
pub struct ContentHandle {
    url: String,
    item: MediaId,
    kind: MediaKind,
    data: Arc<[u8]>,
    live: Arc<AtomicUsize>,
}

impl ContentHandle {
    /// Opaque locator the display surface can open
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn item(&self) -> &MediaId {
        &self.item
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared view of the bytes for surfaces that decode off-thread
    pub fn shared_data(&self) -> Arc<[u8]> {
        self.data.clone()
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ContentHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Released {}", self.url);
    }
}
