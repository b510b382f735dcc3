use async_trait::async_trait;
use crate::core::{MediaId, MediaItem, MediaKind, Orientation};
use crate::library::{LibraryError, LibraryResult};
use crate::playback::player::ContentSource;
use crate::playback::scheduler::TriggerId;
use crate::playback::surface::{DisplaySurface, Frame, SurfaceEvent, SurfaceEvents, SurfaceResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One `present` call as seen by the mock
#[derive(Debug, Clone)]
pub struct Presented {
    pub at: Instant,
    pub index: usize,
    pub item: MediaId,
    pub kind: MediaKind,
    pub url: String,
    pub ticket: TriggerId,
    pub looping: bool,
}

#[derive(Debug, Default)]
struct MockState {
    presented: Vec<Presented>,
    events: Option<SurfaceEvents>,
    empty_shown: usize,
    cleared: usize,
    orientation: Option<Orientation>,
}

/// Mock display surface for testing without a screen
///
/// Records every presentation. Videos can be made to fail on start, or to
/// end automatically after their duration; otherwise the test ends them
/// through a `MockMonitor`.
pub struct MockSurface {
    name: String,
    state: Arc<Mutex<MockState>>,
    failing: HashSet<MediaId>,
    auto_end: bool,
    playback: Option<JoinHandle<()>>,
}

impl MockSurface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
            failing: HashSet::new(),
            auto_end: false,
            playback: None,
        }
    }

    /// End (non-looping) videos automatically after their duration
    pub fn set_auto_end(&mut self, enabled: bool) {
        self.auto_end = enabled;
    }

    /// Make presenting this item fail
    pub fn fail_item(&mut self, item: &MediaId) {
        self.failing.insert(item.clone());
    }

    /// Observer that stays usable after the surface moves into a task
    pub fn monitor(&self) -> MockMonitor {
        MockMonitor {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DisplaySurface for MockSurface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_orientation(&mut self, orientation: Orientation) -> SurfaceResult<()> {
        self.lock().orientation = Some(orientation);
        Ok(())
    }

    async fn present(&mut self, frame: &Frame<'_>, events: &SurfaceEvents) -> SurfaceResult<()> {
        if let Some(task) = self.playback.take() {
            task.abort();
        }
        {
            let mut state = self.lock();
            state.presented.push(Presented {
                at: Instant::now(),
                index: frame.index,
                item: frame.item.id.clone(),
                kind: frame.kind(),
                url: frame.handle.url().to_string(),
                ticket: frame.ticket,
                looping: frame.looping,
            });
            state.events = Some(events.clone());
        }

        if self.failing.contains(&frame.item.id) {
            return Err(format!("cannot decode {}", frame.item.id).into());
        }

        if self.auto_end && frame.kind() == MediaKind::Video {
            let events = events.clone();
            let ticket = frame.ticket;
            let length = frame.duration();
            self.playback = Some(tokio::spawn(async move {
                tokio::time::sleep(length).await;
                let _ = events.send(SurfaceEvent::Ended(ticket));
            }));
        }
        Ok(())
    }

    async fn show_empty(&mut self) -> SurfaceResult<()> {
        self.lock().empty_shown += 1;
        Ok(())
    }

    async fn clear(&mut self) -> SurfaceResult<()> {
        if let Some(task) = self.playback.take() {
            task.abort();
        }
        self.lock().cleared += 1;
        Ok(())
    }
}

/// Test-side view of a `MockSurface`
#[derive(Clone)]
pub struct MockMonitor {
    state: Arc<Mutex<MockState>>,
}

impl MockMonitor {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn presented(&self) -> Vec<Presented> {
        self.lock().presented.clone()
    }

    /// Playlist indices in presentation order
    pub fn indices(&self) -> Vec<usize> {
        self.lock().presented.iter().map(|p| p.index).collect()
    }

    pub fn empty_shown(&self) -> usize {
        self.lock().empty_shown
    }

    pub fn cleared(&self) -> usize {
        self.lock().cleared
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.lock().orientation
    }

    /// Report the natural end of the latest presented video
    pub fn end_current(&self) -> bool {
        self.send_for_current(SurfaceEvent::Ended)
    }

    /// Report an end for any ticket, stale or not
    pub fn end(&self, ticket: TriggerId) -> bool {
        self.lock()
            .events
            .as_ref()
            .is_some_and(|events| events.send(SurfaceEvent::Ended(ticket)).is_ok())
    }

    /// Report a playback error for the latest presented video
    pub fn fail_current(&self) -> bool {
        self.send_for_current(|t| SurfaceEvent::Failed(t, "decoder error".to_string()))
    }

    fn send_for_current(&self, make: impl FnOnce(TriggerId) -> SurfaceEvent) -> bool {
        let state = self.lock();
        match (state.presented.last(), state.events.as_ref()) {
            (Some(last), Some(events)) => events.send(make(last.ticket)).is_ok(),
            _ => false,
        }
    }
}

/// In-memory content for playback tests; unknown blob keys read as missing
#[derive(Debug, Default)]
pub struct MockContent {
    missing: HashSet<String>,
}

impl MockContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make this item's content unreadable
    pub fn remove(&mut self, item: &MediaItem) {
        self.missing.insert(item.content.blob_key.clone());
    }
}

impl ContentSource for MockContent {
    fn load(&self, item: &MediaItem) -> LibraryResult<Vec<u8>> {
        if self.missing.contains(&item.content.blob_key) {
            return Err(LibraryError::ContentMissing(item.content.blob_key.clone()));
        }
        Ok(item.id.as_str().as_bytes().to_vec())
    }
}
