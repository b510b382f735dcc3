use crate::core::MediaItem;
use crate::library::{CampaignStore, LibraryResult};
use crate::playback::handle::{ContentHandle, HandleRegistry};
use crate::playback::scheduler::{Scheduler, SchedulerEvent, Trigger, TriggerId};
use crate::playback::surface::{DisplaySurface, Frame, SurfaceEvent, SurfaceEvents};
use crate::playback::PlaybackState;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Where the player reads item content from
pub trait ContentSource: Send + Sync {
    fn load(&self, item: &MediaItem) -> LibraryResult<Vec<u8>>;
}

impl ContentSource for CampaignStore {
    fn load(&self, item: &MediaItem) -> LibraryResult<Vec<u8>> {
        self.load_content(item)
    }
}

/// Sender side of the exit signal
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Request exit. Safe to call any number of times.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Summary of a finished playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    pub advances: u64,
    pub stale_events: u64,
    pub teardowns: u64,
    pub exits: u64,
}

enum Wake {
    Cancel { closed: bool },
    Surface(SurfaceEvent),
    Timer(TriggerId),
}

/// Drives a `Scheduler` against a display surface on the current task
///
/// Waits only on the image deadline, the surface's end/error channel and
/// the exit signal. Owns the handle of the active item and releases it
/// before acquiring the next one.
pub struct Player {
    scheduler: Scheduler,
    registry: HandleRegistry,
    current: Option<ContentHandle>,
    deadline: Option<(TriggerId, Instant)>,
}

impl Player {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            scheduler: Scheduler::new(items),
            registry: HandleRegistry::new(),
            current: None,
            deadline: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Registry of content handles, for inspecting live handle counts
    pub fn registry(&self) -> HandleRegistry {
        self.registry.clone()
    }

    /// Play until the exit signal fires (or its sender is dropped)
    pub async fn run<S, C>(
        &mut self,
        surface: &mut S,
        content: &C,
        mut cancel: watch::Receiver<bool>,
    ) -> PlaybackReport
    where
        S: DisplaySurface + ?Sized,
        C: ContentSource + ?Sized,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<SurfaceEvent>();
        info!("Starting playback of {} items on {}", self.scheduler.len(), surface.name());

        let cancelled = *cancel.borrow_and_update();
        if !cancelled {
            if self.scheduler.start() {
                self.enter(surface, content, &tx).await;
            } else if let Err(e) = surface.show_empty().await {
                warn!("Surface {} failed to show empty screen: {}", surface.name(), e);
            }

            loop {
                let deadline = self.deadline;
                let wake = tokio::select! {
                    biased;
                    changed = cancel.changed() => Wake::Cancel { closed: changed.is_err() },
                    Some(event) = rx.recv() => Wake::Surface(event),
                    id = wait_for(deadline) => Wake::Timer(id),
                };

                let event = match wake {
                    Wake::Cancel { closed } => {
                        if closed || *cancel.borrow_and_update() {
                            break;
                        }
                        continue;
                    }
                    Wake::Timer(id) => {
                        self.deadline = None;
                        SchedulerEvent::TimerFired(id)
                    }
                    Wake::Surface(SurfaceEvent::Ended(id)) => SchedulerEvent::PlaybackEnded(id),
                    Wake::Surface(SurfaceEvent::Failed(id, reason)) => {
                        warn!("Playback error on trigger {}: {}", id, reason);
                        SchedulerEvent::PlaybackFailed(id)
                    }
                };

                if self.scheduler.handle(event) {
                    self.enter(surface, content, &tx).await;
                } else if self.scheduler.armed().is_none() {
                    self.deadline = None;
                }
            }
        }

        self.exit(surface).await
    }

    /// Release the previous item, then acquire and present the current one
    async fn enter<S, C>(&mut self, surface: &mut S, content: &C, events: &SurfaceEvents)
    where
        S: DisplaySurface + ?Sized,
        C: ContentSource + ?Sized,
    {
        if let Some(previous) = self.current.take() {
            previous.release();
        }
        self.deadline = None;

        let (Some(item), Some(trigger)) = (
            self.scheduler.current().cloned(),
            self.scheduler.armed().cloned(),
        ) else {
            return;
        };
        let ticket = trigger.id();

        let data = match load_off_task(content, &item) {
            Ok(data) => data,
            Err(e) => {
                warn!("Cannot load content of {}: {}", item.id, e);
                let _ = events.send(SurfaceEvent::Failed(ticket, e.to_string()));
                return;
            }
        };
        let handle = self.registry.acquire(&item, data);

        let frame = Frame {
            index: self.scheduler.index(),
            total: self.scheduler.len(),
            item: &item,
            handle: &handle,
            ticket,
            looping: trigger.is_loop(),
        };
        match surface.present(&frame, events).await {
            Ok(()) => {
                if let Trigger::Timer { id, after } = trigger {
                    match Instant::now().checked_add(after) {
                        Some(at) => self.deadline = Some((id, at)),
                        None => {
                            warn!("Display time of {} out of range ({:?})", item.id, after);
                            let reason = "display time out of range".to_string();
                            let _ = events.send(SurfaceEvent::Failed(ticket, reason));
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Surface {} could not show {}: {}", surface.name(), item.id, e);
                let _ = events.send(SurfaceEvent::Failed(ticket, e.to_string()));
            }
        }
        self.current = Some(handle);
    }

    async fn exit<S>(&mut self, surface: &mut S) -> PlaybackReport
    where
        S: DisplaySurface + ?Sized,
    {
        if self.scheduler.cancel() {
            self.deadline = None;
            if let Some(handle) = self.current.take() {
                handle.release();
            }
            if let Err(e) = surface.clear().await {
                warn!("Surface {} failed to clear: {}", surface.name(), e);
            }
        } else {
            debug!("Exit already handled");
        }
        debug_assert_eq!(self.scheduler.state(), PlaybackState::Exiting);

        PlaybackReport {
            advances: self.scheduler.advances(),
            stale_events: self.scheduler.stale_events(),
            teardowns: self.scheduler.teardowns(),
            exits: self.scheduler.exits(),
        }
    }
}

/// Read item content. On a multi-threaded runtime the read runs in
/// `block_in_place` so other tasks keep being polled during large reads.
fn load_off_task<C>(content: &C, item: &MediaItem) -> LibraryResult<Vec<u8>>
where
    C: ContentSource + ?Sized,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(|| content.load(item))
        }
        _ => content.load(item),
    }
}

async fn wait_for(deadline: Option<(TriggerId, Instant)>) -> TriggerId {
    match deadline {
        Some((id, at)) => {
            sleep_until(at).await;
            id
        }
        None => std::future::pending().await,
    }
}
