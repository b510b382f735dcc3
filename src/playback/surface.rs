use async_trait::async_trait;
use crate::core::{MediaItem, MediaKind, Orientation};
use crate::playback::handle::ContentHandle;
use crate::playback::scheduler::TriggerId;
use std::error::Error;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Result type for display surface operations
pub type SurfaceResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Asynchronous notifications from the display surface about the active video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Playback reached its natural end
    Ended(TriggerId),
    /// Playback errored mid-way
    Failed(TriggerId, String),
}

/// Channel on which a surface reports `SurfaceEvent`s
pub type SurfaceEvents = mpsc::UnboundedSender<SurfaceEvent>;

/// What the surface should show right now
#[derive(Debug)]
pub struct Frame<'a> {
    /// Position in the playlist
    pub index: usize,
    /// Playlist length
    pub total: usize,
    pub item: &'a MediaItem,
    pub handle: &'a ContentHandle,
    /// Tag to put on events about this frame
    pub ticket: TriggerId,
    /// Video should loop natively (single-item campaign)
    pub looping: bool,
}

impl Frame<'_> {
    pub fn kind(&self) -> MediaKind {
        self.item.kind
    }

    pub fn duration(&self) -> Duration {
        self.item.play_duration()
    }
}

/// Trait for the display that paints images and plays videos
///
/// The scheduler only tells the surface what is current; decoding and
/// painting are the surface's job. Implementations:
/// - `HeadlessSurface`: logs what would be shown, simulates video ends
/// - `MockSurface`: records presentations for testing
#[async_trait]
pub trait DisplaySurface: Send {
    /// Get the name/identifier of this surface
    fn name(&self) -> &str;

    /// Rotate the output
    async fn set_orientation(&mut self, _orientation: Orientation) -> SurfaceResult<()> {
        Ok(())
    }

    /// Show a frame. For videos, start playback and report its end or error
    /// on `events` tagged with `frame.ticket`. An error return means the
    /// item could not be shown at all.
    async fn present(&mut self, frame: &Frame<'_>, events: &SurfaceEvents) -> SurfaceResult<()>;

    /// Show the "no media" screen
    async fn show_empty(&mut self) -> SurfaceResult<()>;

    /// Stop playback and blank the output
    async fn clear(&mut self) -> SurfaceResult<()>;
}

/// Surface for kiosks without a compositor hookup: logs each item and plays
/// videos as timers of their intrinsic length
pub struct HeadlessSurface {
    name: String,
    playback: Option<JoinHandle<()>>,
}

impl HeadlessSurface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            playback: None,
        }
    }

    fn stop_playback(&mut self) {
        if let Some(task) = self.playback.take() {
            task.abort();
        }
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.stop_playback();
    }
}

#[async_trait]
impl DisplaySurface for HeadlessSurface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_orientation(&mut self, orientation: Orientation) -> SurfaceResult<()> {
        info!("[{}] orientation {} ({} deg)", self.name, orientation, orientation.degrees());
        Ok(())
    }

    async fn present(&mut self, frame: &Frame<'_>, events: &SurfaceEvents) -> SurfaceResult<()> {
        self.stop_playback();
        info!(
            "[{}] {}/{} {} {} ({} bytes, {:.1}s{})",
            self.name,
            frame.index + 1,
            frame.total,
            frame.kind(),
            frame.handle.url(),
            frame.handle.data().len(),
            frame.item.duration,
            if frame.looping { ", looping" } else { "" }
        );

        if frame.kind() == MediaKind::Video && !frame.looping {
            let events = events.clone();
            let ticket = frame.ticket;
            let length = frame.duration();
            self.playback = Some(tokio::spawn(async move {
                tokio::time::sleep(length).await;
                debug!("Simulated video end for {}", ticket);
                let _ = events.send(SurfaceEvent::Ended(ticket));
            }));
        }
        Ok(())
    }

    async fn show_empty(&mut self) -> SurfaceResult<()> {
        self.stop_playback();
        info!("[{}] This campaign has no media.", self.name);
        Ok(())
    }

    async fn clear(&mut self) -> SurfaceResult<()> {
        self.stop_playback();
        info!("[{}] cleared", self.name);
        Ok(())
    }
}
