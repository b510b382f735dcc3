use crate::core::{MediaItem, MediaKind};
use crate::playback::PlaybackState;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identity of one armed advancement trigger
///
/// Every arm gets a fresh id, so an event that refers to a trigger that
/// has since been torn down can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(u64);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single pending advancement trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Image: advance once `after` has elapsed
    Timer { id: TriggerId, after: Duration },
    /// Video in a multi-item playlist: advance on end of playback or error
    PlaybackEnd { id: TriggerId },
    /// Only item of the playlist is a video: it loops natively, nothing advances
    Loop { id: TriggerId },
}

impl Trigger {
    pub fn id(&self) -> TriggerId {
        match self {
            Trigger::Timer { id, .. } | Trigger::PlaybackEnd { id } | Trigger::Loop { id } => *id,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Trigger::Loop { .. })
    }
}

/// Inputs to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The image countdown expired
    TimerFired(TriggerId),
    /// The video reached its natural end
    PlaybackEnded(TriggerId),
    /// The item could not be shown: video failed to start or errored, content unreadable
    PlaybackFailed(TriggerId),
    /// Exit requested
    Cancel,
}

/// Advancement state machine over a campaign snapshot
///
/// Pure and synchronous: the caller feeds events and reads back the armed
/// trigger. `Idle` until `start`, then `ShowingImage`/`ShowingVideo` while
/// cycling through the snapshot, and `Exiting` once cancelled.
#[derive(Debug)]
pub struct Scheduler {
    items: Vec<MediaItem>,
    index: usize,
    state: PlaybackState,
    armed: Option<Trigger>,
    next_trigger: u64,
    advances: u64,
    failures_in_row: usize,
    stale_events: u64,
    teardowns: u64,
    exits: u64,
}

impl Scheduler {
    /// Scheduler over a snapshot of a campaign's media; later edits are not seen
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            index: 0,
            state: PlaybackState::Idle,
            armed: None,
            next_trigger: 0,
            advances: 0,
            failures_in_row: 0,
            stale_events: 0,
            teardowns: 0,
            exits: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item on screen, if playing
    pub fn current(&self) -> Option<&MediaItem> {
        match self.state {
            PlaybackState::ShowingImage | PlaybackState::ShowingVideo => self.items.get(self.index),
            PlaybackState::Idle | PlaybackState::Exiting => None,
        }
    }

    pub fn armed(&self) -> Option<&Trigger> {
        self.armed.as_ref()
    }

    /// Number of index advances so far
    pub fn advances(&self) -> u64 {
        self.advances
    }

    /// Events ignored because their trigger was no longer armed
    pub fn stale_events(&self) -> u64 {
        self.stale_events
    }

    /// Triggers torn down, including the one cleared on exit
    pub fn teardowns(&self) -> u64 {
        self.teardowns
    }

    /// Times exit teardown actually ran (0 or 1)
    pub fn exits(&self) -> u64 {
        self.exits
    }

    /// Leave `Idle` and show the first item.
    ///
    /// Returns false when there is nothing to play: an empty campaign stays
    /// `Idle` (the "no media" screen) until cancelled.
    pub fn start(&mut self) -> bool {
        if self.state != PlaybackState::Idle {
            return false;
        }
        if self.items.is_empty() {
            info!("Campaign has no media, nothing to schedule");
            return false;
        }
        self.transition_to(0);
        true
    }

    /// Feed one event. Returns true when the current item changed (or was
    /// re-entered) and the caller must present it.
    pub fn handle(&mut self, event: SchedulerEvent) -> bool {
        if event == SchedulerEvent::Cancel {
            self.cancel();
            return false;
        }
        if !matches!(self.state, PlaybackState::ShowingImage | PlaybackState::ShowingVideo) {
            debug!("Ignoring {:?} in state {:?}", event, self.state);
            return false;
        }

        let Some(armed) = self.armed.clone() else {
            self.stale_events += 1;
            debug!("Ignoring {:?}: no trigger armed", event);
            return false;
        };

        match (&event, &armed) {
            (SchedulerEvent::TimerFired(id), Trigger::Timer { id: armed_id, .. })
            | (SchedulerEvent::PlaybackEnded(id), Trigger::PlaybackEnd { id: armed_id })
                if id == armed_id =>
            {
                self.failures_in_row = 0;
                self.advance();
                true
            }
            (SchedulerEvent::PlaybackFailed(id), Trigger::Timer { id: armed_id, .. })
            | (SchedulerEvent::PlaybackFailed(id), Trigger::PlaybackEnd { id: armed_id })
                if id == armed_id =>
            {
                self.failures_in_row += 1;
                if self.failures_in_row >= self.items.len() {
                    warn!("Every item of the campaign failed, holding");
                    self.teardown();
                    return false;
                }
                warn!(
                    "Item {} ({}) failed, skipping",
                    self.index, self.items[self.index].id
                );
                self.advance();
                true
            }
            (SchedulerEvent::PlaybackEnded(id), Trigger::Loop { id: armed_id }) if id == armed_id => {
                debug!("Single video looped");
                false
            }
            (SchedulerEvent::PlaybackFailed(id), Trigger::Loop { id: armed_id }) if id == armed_id => {
                // Skipping would land on the same item again; hold instead of spinning
                warn!("Only video of the campaign failed, holding");
                self.teardown();
                false
            }
            _ => {
                self.stale_events += 1;
                debug!("Ignoring stale {:?} (armed {:?})", event, armed);
                false
            }
        }
    }

    /// Stop scheduling. Idempotent: returns true only the first time.
    pub fn cancel(&mut self) -> bool {
        if self.state == PlaybackState::Exiting {
            return false;
        }
        self.teardown();
        self.state = PlaybackState::Exiting;
        self.exits += 1;
        info!("Playback exiting after {} advances", self.advances);
        true
    }

    fn advance(&mut self) {
        let next = (self.index + 1) % self.items.len();
        self.advances += 1;
        self.transition_to(next);
    }

    /// Tear down the armed trigger, then arm one for the item at `index`
    fn transition_to(&mut self, index: usize) {
        self.teardown();
        self.index = index;

        let item = &self.items[index];
        let id = TriggerId(self.next_trigger);
        self.next_trigger += 1;

        let (state, trigger) = match item.kind {
            MediaKind::Image => (
                PlaybackState::ShowingImage,
                Trigger::Timer {
                    id,
                    after: item.play_duration(),
                },
            ),
            MediaKind::Video if self.items.len() == 1 => (PlaybackState::ShowingVideo, Trigger::Loop { id }),
            MediaKind::Video => (PlaybackState::ShowingVideo, Trigger::PlaybackEnd { id }),
        };
        debug!("-> {:?} item {} ({}) trigger {}", state, index, item.id, id);
        self.state = state;
        self.armed = Some(trigger);
    }

    fn teardown(&mut self) {
        if let Some(trigger) = self.armed.take() {
            self.teardowns += 1;
            debug!("Disarmed trigger {}", trigger.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContentRef;

    fn content() -> ContentRef {
        ContentRef {
            blob_key: "k".to_string(),
            size: 1,
            mime: None,
        }
    }

    fn image(secs: u32) -> MediaItem {
        MediaItem::image(content(), secs)
    }

    fn video(secs: f64) -> MediaItem {
        MediaItem::video(content(), secs)
    }

    /// Fire whatever trigger is armed the way its source would
    fn complete(s: &mut Scheduler) -> bool {
        match s.armed().cloned() {
            Some(Trigger::Timer { id, .. }) => s.handle(SchedulerEvent::TimerFired(id)),
            Some(Trigger::PlaybackEnd { id }) | Some(Trigger::Loop { id }) => {
                s.handle(SchedulerEvent::PlaybackEnded(id))
            }
            None => false,
        }
    }

    #[test]
    fn test_starts_idle() {
        let s = Scheduler::new(vec![image(5)]);
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(s.current().is_none());
        assert!(s.armed().is_none());
    }

    #[test]
    fn test_empty_campaign_stays_idle() {
        let mut s = Scheduler::new(Vec::new());
        assert!(!s.start());
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(s.cancel());
        assert_eq!(s.state(), PlaybackState::Exiting);
    }

    #[test]
    fn test_cycles_back_to_zero_after_n_advances() {
        for n in 1..=6 {
            let items: Vec<MediaItem> = (0..n)
                .map(|i| if i % 2 == 0 { image(5) } else { video(3.0) })
                .collect();
            let mut s = Scheduler::new(items);
            assert!(s.start());
            for step in 1..=n {
                // a single image re-enters itself on expiry
                assert!(complete(&mut s));
                assert_eq!(s.index(), step % n, "n={} step={}", n, step);
            }
            assert_eq!(s.index(), 0);
            assert_eq!(s.advances(), n as u64);
        }
    }

    #[test]
    fn test_image_arms_timer_with_duration() {
        let mut s = Scheduler::new(vec![image(5), video(2.0)]);
        s.start();
        assert_eq!(s.state(), PlaybackState::ShowingImage);
        match s.armed() {
            Some(Trigger::Timer { after, .. }) => assert_eq!(*after, Duration::from_secs(5)),
            other => panic!("unexpected trigger {:?}", other),
        }
        complete(&mut s);
        assert_eq!(s.state(), PlaybackState::ShowingVideo);
        assert!(matches!(s.armed(), Some(Trigger::PlaybackEnd { .. })));
    }

    #[test]
    fn test_out_of_range_durations_do_not_panic() {
        let mut huge = image(5);
        huge.duration = 1e19;
        let mut negative = image(5);
        negative.duration = -1.0;
        let mut s = Scheduler::new(vec![huge, negative]);
        assert!(s.start());
        assert!(matches!(
            s.armed(),
            Some(Trigger::Timer { after, .. }) if *after == Duration::from_secs(86_400)
        ));
        assert!(complete(&mut s));
        assert!(matches!(
            s.armed(),
            Some(Trigger::Timer { after, .. }) if *after == Duration::from_secs(10)
        ));
    }

    #[test]
    fn test_single_video_loops_without_advancing() {
        let mut s = Scheduler::new(vec![video(4.0)]);
        s.start();
        let armed = s.armed().cloned().unwrap();
        assert!(armed.is_loop());
        for _ in 0..5 {
            assert!(!s.handle(SchedulerEvent::PlaybackEnded(armed.id())));
        }
        assert_eq!(s.index(), 0);
        assert_eq!(s.advances(), 0);
        assert_eq!(s.armed(), Some(&armed));
    }

    #[test]
    fn test_single_video_failure_holds() {
        let mut s = Scheduler::new(vec![video(4.0)]);
        s.start();
        let id = s.armed().unwrap().id();
        assert!(!s.handle(SchedulerEvent::PlaybackFailed(id)));
        assert!(s.armed().is_none());
        assert_eq!(s.advances(), 0);
        assert!(s.cancel());
    }

    #[test]
    fn test_one_advance_per_trigger() {
        let mut s = Scheduler::new(vec![video(1.0), video(1.0), image(5)]);
        s.start();
        let first = s.armed().unwrap().id();

        assert!(s.handle(SchedulerEvent::PlaybackEnded(first)));
        assert_eq!(s.index(), 1);

        // Late duplicate end and error from the old trigger change nothing
        assert!(!s.handle(SchedulerEvent::PlaybackEnded(first)));
        assert!(!s.handle(SchedulerEvent::PlaybackFailed(first)));
        assert_eq!(s.index(), 1);
        assert_eq!(s.advances(), 1);
        assert_eq!(s.stale_events(), 2);
    }

    #[test]
    fn test_event_kind_must_match_trigger() {
        let mut s = Scheduler::new(vec![image(5), image(5)]);
        s.start();
        let id = s.armed().unwrap().id();
        assert!(!s.handle(SchedulerEvent::PlaybackEnded(id)));
        assert_eq!(s.index(), 0);
        assert!(s.handle(SchedulerEvent::TimerFired(id)));
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn test_failure_skips_to_next() {
        let mut s = Scheduler::new(vec![video(1.0), image(10), image(10)]);
        s.start();
        let id = s.armed().unwrap().id();
        assert!(s.handle(SchedulerEvent::PlaybackFailed(id)));
        assert_eq!(s.index(), 1);
        assert_eq!(s.state(), PlaybackState::ShowingImage);
    }

    #[test]
    fn test_all_items_failing_holds() {
        let mut s = Scheduler::new(vec![image(5), video(1.0)]);
        s.start();
        let id = s.armed().unwrap().id();
        assert!(s.handle(SchedulerEvent::PlaybackFailed(id)));
        let id = s.armed().unwrap().id();
        assert!(!s.handle(SchedulerEvent::PlaybackFailed(id)));
        assert!(s.armed().is_none());
        assert_eq!(s.advances(), 1);
    }

    #[test]
    fn test_success_resets_failure_run() {
        let mut s = Scheduler::new(vec![image(5), image(5)]);
        s.start();
        let id = s.armed().unwrap().id();
        assert!(s.handle(SchedulerEvent::PlaybackFailed(id)));
        assert!(complete(&mut s));
        let id = s.armed().unwrap().id();
        assert!(s.handle(SchedulerEvent::PlaybackFailed(id)));
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn test_transition_tears_down_before_arming() {
        let mut s = Scheduler::new(vec![image(5), image(5), image(5)]);
        s.start();
        assert_eq!(s.teardowns(), 0);
        complete(&mut s);
        complete(&mut s);
        // one teardown per switch, exactly one trigger armed
        assert_eq!(s.teardowns(), 2);
        assert!(s.armed().is_some());
    }

    #[test]
    fn test_cancel_twice_runs_teardown_once() {
        let mut s = Scheduler::new(vec![image(5), image(5)]);
        s.start();
        assert!(s.cancel());
        let teardowns = s.teardowns();
        assert!(!s.cancel());
        s.handle(SchedulerEvent::Cancel);
        assert_eq!(s.teardowns(), teardowns);
        assert_eq!(s.exits(), 1);
        assert!(s.armed().is_none());
        assert_eq!(s.state(), PlaybackState::Exiting);
    }

    #[test]
    fn test_no_events_after_exit() {
        let mut s = Scheduler::new(vec![image(5), image(5)]);
        s.start();
        let id = s.armed().unwrap().id();
        s.cancel();
        assert!(!s.handle(SchedulerEvent::TimerFired(id)));
        assert_eq!(s.index(), 0);
        assert!(!s.start());
    }
}
