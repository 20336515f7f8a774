//! Motion → playback decisions and the record window timer.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use tracing::{debug, info, warn};

use crate::player::Player;

/// How long playback lasts after the last motion when no preview
/// duration is configured.
pub const DEFAULT_RECORD_WINDOW: Duration = Duration::from_secs(10);

/// Shortest accepted preview duration.
pub const MIN_PREVIEW_DURATION: Duration = Duration::from_secs(3);

/// Record window for an optional caller-supplied preview duration.
pub fn record_window(preview: Option<Duration>) -> Duration {
    preview
        .map(|duration| duration.max(MIN_PREVIEW_DURATION))
        .unwrap_or(DEFAULT_RECORD_WINDOW)
}

/// What a motion report changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Playback started and the window was armed.
    Started,
    /// Already playing: the window was re-armed from zero.
    Extended,
    /// The player refused the stream; nothing armed.
    PlayFailed,
    /// No motion, nothing to do.
    Unchanged,
}

pub struct MotionGate {
    player: Box<dyn Player>,
    record_window: Duration,
    stream_uri: Option<String>,
    stop_timer: Option<Pin<Box<Sleep>>>,
}

impl MotionGate {
    pub fn new(player: Box<dyn Player>, record_window: Duration) -> Self {
        Self {
            player,
            record_window,
            stream_uri: None,
            stop_timer: None,
        }
    }

    pub fn record_window(&self) -> Duration {
        self.record_window
    }

    pub fn set_stream_uri(&mut self, uri: impl Into<String>) {
        self.stream_uri = Some(uri.into());
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn window_armed(&self) -> bool {
        self.stop_timer.is_some()
    }

    pub fn take_end_of_stream(&mut self) -> Option<tokio::sync::mpsc::UnboundedReceiver<()>> {
        self.player.end_of_stream()
    }

    /// Plays the stream right away, without any window.
    pub fn play_continuous(&mut self) -> bool {
        match self.stream_uri.as_deref() {
            Some(uri) => self.player.play(uri),
            None => false,
        }
    }

    pub fn on_motion(&mut self, motion: bool) -> MotionOutcome {
        if !motion {
            return MotionOutcome::Unchanged;
        }

        let outcome = if self.player.is_playing() {
            MotionOutcome::Extended
        } else {
            let Some(uri) = self.stream_uri.as_deref() else {
                warn!("motion before stream uri is known");
                return MotionOutcome::PlayFailed;
            };
            if !self.player.play(uri) {
                warn!(uri, "player refused stream, will retry on next motion");
                return MotionOutcome::PlayFailed;
            }
            info!(uri, "motion detected, playback started");
            MotionOutcome::Started
        };

        // Replacing the timer drops the previous one: windows extend, never stack.
        self.stop_timer = Some(Box::pin(sleep(self.record_window)));
        debug!(window_ms = self.record_window.as_millis() as u64, "record window armed");
        outcome
    }

    /// Resolves when the record window runs out. Pending while no window
    /// is armed.
    pub async fn window_elapsed(&mut self) {
        match self.stop_timer.as_mut() {
            Some(timer) => timer.as_mut().await,
            None => pending().await,
        }
    }

    /// Stops playback once the window ran out.
    pub fn on_window_elapsed(&mut self) {
        self.stop_timer = None;
        self.player.stop();
        info!("record window elapsed, playback stopped");
    }

    pub fn teardown(&mut self) {
        self.stop_timer = None;
        if self.player.is_playing() {
            self.player.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Counters {
        plays: usize,
        stops: usize,
        playing: bool,
    }

    struct FakePlayer(Arc<Mutex<Counters>>);

    impl Player for FakePlayer {
        fn play(&mut self, _uri: &str) -> bool {
            let mut c = self.0.lock().unwrap();
            c.plays += 1;
            c.playing = true;
            true
        }

        fn stop(&mut self) {
            let mut c = self.0.lock().unwrap();
            c.stops += 1;
            c.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.0.lock().unwrap().playing
        }
    }

    fn gate() -> (MotionGate, Arc<Mutex<Counters>>) {
        let counters = Arc::new(Mutex::new(Counters::default()));
        let mut gate = MotionGate::new(
            Box::new(FakePlayer(counters.clone())),
            DEFAULT_RECORD_WINDOW,
        );
        gate.set_stream_uri("rtsp://cam/live");
        (gate, counters)
    }

    #[test]
    fn preview_duration_is_clamped() {
        assert_eq!(record_window(None), Duration::from_secs(10));
        assert_eq!(record_window(Some(Duration::from_secs(1))), Duration::from_secs(3));
        assert_eq!(record_window(Some(Duration::from_secs(25))), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn motion_starts_then_extends() {
        let (mut gate, counters) = gate();

        assert_eq!(gate.on_motion(false), MotionOutcome::Unchanged);
        assert!(!gate.window_armed());

        assert_eq!(gate.on_motion(true), MotionOutcome::Started);
        assert_eq!(gate.on_motion(true), MotionOutcome::Extended);
        assert_eq!(counters.lock().unwrap().plays, 1);
        assert!(gate.window_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_stops_playback() {
        let (mut gate, counters) = gate();
        gate.on_motion(true);

        let start = tokio::time::Instant::now();
        gate.window_elapsed().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_RECORD_WINDOW);
        assert!(elapsed < DEFAULT_RECORD_WINDOW + Duration::from_millis(10));

        gate.on_window_elapsed();
        assert!(!gate.is_playing());
        assert_eq!(counters.lock().unwrap().stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_only_when_playing() {
        let (mut gate, counters) = gate();
        gate.teardown();
        assert_eq!(counters.lock().unwrap().stops, 0);

        gate.on_motion(true);
        gate.teardown();
        assert_eq!(counters.lock().unwrap().stops, 1);
        assert!(!gate.window_armed());
    }
}
