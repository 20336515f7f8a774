//! Monitor session: discovery, polling and playback for one device.
//!
//! A session is a single tokio task running a `select!` loop that owns all
//! of its state. Remote calls run on blocking workers and only their results
//! come back into the loop; timers are plain fields of the loop. Cancelling
//! the session token stops everything: the cancellation branch is polled
//! first, so nothing completes after it fired.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::MonitorError;
use crate::gateway::SharedGateway;
use crate::motion_gate::{MotionGate, MotionOutcome, record_window};
use crate::player::Player;
use crate::model::{DeviceEndpoint, MediaUris};
use crate::prober;
use crate::scheduler::{PollPolicy, PollScheduler};
use crate::subscription::SubscriptionManager;

/// Milestones reported on the optional observer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    MediaDiscovered(MediaUris),
    PollScheduled { delay: Duration },
    PollFailed(MonitorError),
    Motion(bool),
    RecordWindowArmed(Duration),
    PlaybackStarted(String),
    PlaybackStopped,
}

type PollOutcome = (SubscriptionManager, Result<bool, MonitorError>);

pub struct MonitorSessionBuilder {
    endpoint: DeviceEndpoint,
    gateway: SharedGateway,
    player: Box<dyn Player>,
    track_motion: bool,
    preview_duration: Option<Duration>,
    poll_policy: PollPolicy,
    observer: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl MonitorSessionBuilder {
    /// Follow the motion feed (default) or play continuously.
    pub fn track_motion(mut self, track_motion: bool) -> Self {
        self.track_motion = track_motion;
        self
    }

    /// Playback duration after the last motion, clamped to 3 s minimum.
    pub fn preview_duration(mut self, duration: Option<Duration>) -> Self {
        self.preview_duration = duration;
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn observer(mut self, observer: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Spawns the session loop on the current runtime.
    ///
    /// The receiver gets at most one terminal error; it is closed without a
    /// value when the session is shut down.
    pub fn start(self) -> (MonitorSession, oneshot::Receiver<MonitorError>) {
        let cancel = CancellationToken::new();
        let (eos_tx, eos_rx) = oneshot::channel();

        let mut gate = MotionGate::new(self.player, record_window(self.preview_duration));
        let player_eos = if self.track_motion {
            None
        } else {
            gate.take_end_of_stream()
        };

        let session_loop = SessionLoop {
            endpoint: self.endpoint,
            gateway: self.gateway,
            cancel: cancel.clone(),
            track_motion: self.track_motion,
            gate,
            scheduler: PollScheduler::new(self.poll_policy),
            media: None,
            subscription: None,
            probe_task: None,
            poll_task: None,
            next_poll: None,
            player_eos,
            eos: Some(eos_tx),
            observer: self.observer,
        };

        let task = tokio::spawn(session_loop.run());

        (
            MonitorSession {
                cancel,
                task: Some(task),
            },
            eos_rx,
        )
    }
}

/// Handle on a running session. Dropping it cancels the session.
pub struct MonitorSession {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorSession {
    pub fn builder(
        endpoint: DeviceEndpoint,
        gateway: SharedGateway,
        player: Box<dyn Player>,
    ) -> MonitorSessionBuilder {
        MonitorSessionBuilder {
            endpoint,
            gateway,
            player,
            track_motion: true,
            preview_duration: None,
            poll_policy: PollPolicy::default(),
            observer: None,
        }
    }

    /// Cancels the session and waits for its loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SessionLoop {
    endpoint: DeviceEndpoint,
    gateway: SharedGateway,
    cancel: CancellationToken,
    track_motion: bool,
    gate: MotionGate,
    scheduler: PollScheduler,
    media: Option<MediaUris>,
    /// `None` while a poll task holds the manager.
    subscription: Option<SubscriptionManager>,
    probe_task: Option<JoinHandle<Result<MediaUris, MonitorError>>>,
    poll_task: Option<JoinHandle<PollOutcome>>,
    next_poll: Option<Pin<Box<Sleep>>>,
    player_eos: Option<mpsc::UnboundedReceiver<()>>,
    eos: Option<oneshot::Sender<MonitorError>>,
    observer: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionLoop {
    async fn run(mut self) {
        info!(device = %self.endpoint.url, track_motion = self.track_motion, "session started");

        self.probe_task = Some(tokio::spawn(prober::discover(
            self.gateway.clone(),
            self.endpoint.clone(),
            self.cancel.child_token(),
        )));

        while self.eos.is_some() {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                joined = join_task(&mut self.probe_task) => {
                    self.probe_task = None;
                    let result = joined.unwrap_or_else(|e| Err(MonitorError::Worker(e.to_string())));
                    self.on_probe_done(result);
                }

                joined = join_task(&mut self.poll_task) => {
                    self.poll_task = None;
                    self.on_poll_done(joined);
                }

                _ = expire(&mut self.next_poll) => {
                    self.next_poll = None;
                    self.start_poll();
                }

                _ = self.gate.window_elapsed() => {
                    self.gate.on_window_elapsed();
                    self.emit(SessionEvent::PlaybackStopped);
                }

                ended = next_end_of_stream(&mut self.player_eos) => {
                    match ended {
                        Some(()) => self.finish(MonitorError::StreamEnded),
                        None => self.player_eos = None,
                    }
                }
            }
        }

        self.teardown();
        debug!(device = %self.endpoint.url, "session loop exited");
    }

    fn on_probe_done(&mut self, result: Result<MediaUris, MonitorError>) {
        let uris = match result {
            Ok(uris) => uris,
            Err(MonitorError::Cancelled) => return,
            Err(e) => {
                error!(device = %self.endpoint.url, error = %e, "device discovery failed");
                self.finish(e);
                return;
            }
        };

        self.gate.set_stream_uri(uris.stream_uri.clone());
        self.emit(SessionEvent::MediaDiscovered(uris.clone()));

        if self.track_motion {
            self.subscription = Some(SubscriptionManager::new(uris.media_endpoint_uri.clone()));
            self.media = Some(uris);
            let delay = self.scheduler.first_delay();
            self.arm_next_poll(delay);
        } else {
            let uri = uris.stream_uri.clone();
            self.media = Some(uris);
            if self.gate.play_continuous() {
                info!(uri = %uri, "playback started");
                self.emit(SessionEvent::PlaybackStarted(uri));
            } else {
                error!(uri = %uri, "player refused stream");
                self.finish(MonitorError::PlaybackFailed { uri });
            }
        }
    }

    fn start_poll(&mut self) {
        let Some(manager) = self.subscription.take() else {
            warn!("poll timer fired while a poll is in flight");
            return;
        };
        self.poll_task = Some(tokio::spawn(
            manager.poll(self.gateway.clone(), self.cancel.child_token()),
        ));
    }

    fn on_poll_done(&mut self, joined: Result<PollOutcome, JoinError>) {
        let result = match joined {
            Ok((manager, result)) => {
                self.subscription = Some(manager);
                result
            }
            Err(e) => {
                let media_endpoint = self
                    .media
                    .as_ref()
                    .map(|m| m.media_endpoint_uri.clone())
                    .unwrap_or_default();
                self.subscription = Some(SubscriptionManager::new(media_endpoint));
                Err(MonitorError::Worker(e.to_string()))
            }
        };

        match result {
            Err(MonitorError::Cancelled) => {}
            Err(e) => {
                warn!(error = %e, step = ?e.step(), "poll failed, backing off");
                self.emit(SessionEvent::PollFailed(e));
                let delay = self.scheduler.after_failure();
                self.arm_next_poll(delay);
            }
            Ok(motion) => {
                debug!(motion, "poll succeeded");
                self.emit(SessionEvent::Motion(motion));
                self.apply_motion(motion);
                let delay = self.scheduler.after_success();
                self.arm_next_poll(delay);
            }
        }
    }

    fn apply_motion(&mut self, motion: bool) {
        match self.gate.on_motion(motion) {
            MotionOutcome::Started => {
                if let Some(uri) = self.media.as_ref().map(|m| m.stream_uri.clone()) {
                    self.emit(SessionEvent::PlaybackStarted(uri));
                }
                self.emit(SessionEvent::RecordWindowArmed(self.gate.record_window()));
            }
            MotionOutcome::Extended => {
                self.emit(SessionEvent::RecordWindowArmed(self.gate.record_window()));
            }
            MotionOutcome::PlayFailed | MotionOutcome::Unchanged => {}
        }
    }

    fn arm_next_poll(&mut self, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "next poll scheduled");
        self.next_poll = Some(Box::pin(sleep(delay)));
        self.emit(SessionEvent::PollScheduled { delay });
    }

    /// Delivers the terminal error, at most once per session.
    fn finish(&mut self, err: MonitorError) {
        if let Some(eos) = self.eos.take() {
            let _ = eos.send(err);
        }
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        self.probe_task = None;
        self.poll_task = None;
        self.next_poll = None;
        self.player_eos = None;
        self.gate.teardown();
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(event);
        }
    }
}

async fn join_task<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn next_end_of_stream(rx: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
