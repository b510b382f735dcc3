pub mod handle;
pub mod mock;
pub mod player;
pub mod scheduler;
pub mod session;
pub mod surface;

pub use handle::{ContentHandle, HandleRegistry};
pub use mock::{MockContent, MockMonitor, MockSurface};
pub use player::{CancelSignal, ContentSource, PlaybackReport, Player};
pub use scheduler::{Scheduler, SchedulerEvent, Trigger, TriggerId};
pub use session::{launch_target, play_campaign, play_target, resolve_campaign, SessionOutcome};
pub use surface::{DisplaySurface, Frame, HeadlessSurface, SurfaceEvent, SurfaceEvents, SurfaceResult};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not started, or showing the "no media" screen
    Idle,
    ShowingImage,
    ShowingVideo,
    /// Cancelled; nothing is armed
    Exiting,
}
