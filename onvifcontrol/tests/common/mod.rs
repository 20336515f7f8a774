#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc as std_mpsc};

use onvifcontrol::model::{
    Capabilities, MediaProfile, NotificationMessage, SimpleItem, StreamProtocol,
    SubscriptionReference,
};
use onvifcontrol::{GatewayFault, OnvifGateway, Player};
use tokio::sync::{mpsc, oneshot};

pub const DEVICE_URL: &str = "http://10.0.0.5/onvif/device_service";
pub const MEDIA_URL: &str = "http://10.0.0.5/onvif/media_service";
pub const STREAM_URI: &str = "rtsp://10.0.0.5:554/Streaming/Channels/101";
pub const SUBSCRIPTION_URL: &str = "http://10.0.0.5/onvif/Subscription?Idx=1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetCapabilities(String),
    GetProfiles(String),
    GetStreamUri { media_url: String, token: String },
    CreatePullPointSubscription(String),
    Renew(String),
    PullMessages(String),
}

pub fn motion(value: bool) -> Vec<NotificationMessage> {
    vec![NotificationMessage::with_items(vec![SimpleItem::new(
        "IsMotion",
        if value { "true" } else { "false" },
    )])]
}

pub fn fault(message: &str) -> GatewayFault {
    GatewayFault::with_status(message, 500)
}

struct PullBlocker {
    entered: Option<oneshot::Sender<()>>,
    release: std_mpsc::Receiver<()>,
}

/// In-memory camera. Discovery answers are fixed; subscription answers are
/// queued and fall back to success (no motion) once the queue is empty.
pub struct ScriptedGateway {
    capabilities: Mutex<Result<Capabilities, GatewayFault>>,
    profiles: Mutex<Result<Vec<MediaProfile>, GatewayFault>>,
    stream_uri: Mutex<Result<Option<String>, GatewayFault>>,
    creates: Mutex<VecDeque<Result<SubscriptionReference, GatewayFault>>>,
    renews: Mutex<VecDeque<Result<(), GatewayFault>>>,
    pulls: Mutex<VecDeque<Result<Vec<NotificationMessage>, GatewayFault>>>,
    blocker: Mutex<Option<PullBlocker>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn camera() -> Self {
        Self {
            capabilities: Mutex::new(Ok(Capabilities {
                media_xaddr: Some(MEDIA_URL.to_string()),
                events_xaddr: Some("http://10.0.0.5/onvif/event_service".to_string()),
            })),
            profiles: Mutex::new(Ok(vec![
                MediaProfile {
                    token: "main".to_string(),
                    name: Some("MainStream".to_string()),
                },
                MediaProfile {
                    token: "sub".to_string(),
                    name: Some("SubStream".to_string()),
                },
            ])),
            stream_uri: Mutex::new(Ok(Some(STREAM_URI.to_string()))),
            creates: Mutex::new(VecDeque::new()),
            renews: Mutex::new(VecDeque::new()),
            pulls: Mutex::new(VecDeque::new()),
            blocker: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(self, caps: Result<Capabilities, GatewayFault>) -> Self {
        *self.capabilities.lock().unwrap() = caps;
        self
    }

    pub fn with_profiles(self, profiles: Result<Vec<MediaProfile>, GatewayFault>) -> Self {
        *self.profiles.lock().unwrap() = profiles;
        self
    }

    pub fn with_stream_uri(self, uri: Result<Option<String>, GatewayFault>) -> Self {
        *self.stream_uri.lock().unwrap() = uri;
        self
    }

    pub fn push_create(&self, result: Result<SubscriptionReference, GatewayFault>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_renew(&self, result: Result<(), GatewayFault>) {
        self.renews.lock().unwrap().push_back(result);
    }

    pub fn push_pull(&self, result: Result<Vec<NotificationMessage>, GatewayFault>) {
        self.pulls.lock().unwrap().push_back(result);
    }

    /// Makes the next pull block until the returned sender fires. The
    /// receiver resolves once the pull is in progress.
    pub fn block_next_pull(&self) -> (oneshot::Receiver<()>, std_mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        *self.blocker.lock().unwrap() = Some(PullBlocker {
            entered: Some(entered_tx),
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl OnvifGateway for ScriptedGateway {
    fn get_capabilities(&self, device_url: &str) -> Result<Capabilities, GatewayFault> {
        self.record(Call::GetCapabilities(device_url.to_string()));
        self.capabilities.lock().unwrap().clone()
    }

    fn get_profiles(&self, media_url: &str) -> Result<Vec<MediaProfile>, GatewayFault> {
        self.record(Call::GetProfiles(media_url.to_string()));
        self.profiles.lock().unwrap().clone()
    }

    fn get_stream_uri(
        &self,
        media_url: &str,
        profile_token: &str,
        protocol: StreamProtocol,
    ) -> Result<Option<String>, GatewayFault> {
        assert_eq!(protocol, StreamProtocol::Rtsp);
        self.record(Call::GetStreamUri {
            media_url: media_url.to_string(),
            token: profile_token.to_string(),
        });
        self.stream_uri.lock().unwrap().clone()
    }

    fn create_pull_point_subscription(
        &self,
        url: &str,
        initial_termination_time: &str,
    ) -> Result<SubscriptionReference, GatewayFault> {
        assert_eq!(initial_termination_time, "PT1M");
        self.record(Call::CreatePullPointSubscription(url.to_string()));
        self.creates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SubscriptionReference {
                    address: SUBSCRIPTION_URL.to_string(),
                })
            })
    }

    fn renew(&self, subscription_url: &str, termination_time: &str) -> Result<(), GatewayFault> {
        assert_eq!(termination_time, "PT1M");
        self.record(Call::Renew(subscription_url.to_string()));
        self.renews.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn pull_messages(&self, subscription_url: &str) -> Result<Vec<NotificationMessage>, GatewayFault> {
        self.record(Call::PullMessages(subscription_url.to_string()));

        let blocker = self.blocker.lock().unwrap().take();
        if let Some(mut blocker) = blocker {
            if let Some(entered) = blocker.entered.take() {
                let _ = entered.send(());
            }
            let _ = blocker.release.recv();
        }

        self.pulls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(motion(false)))
    }
}

#[derive(Debug, Default)]
pub struct PlayerLog {
    pub plays: Vec<String>,
    pub stops: usize,
    pub playing: bool,
}

/// Player that only records what it is asked to do.
pub struct RecordingPlayer {
    log: Arc<Mutex<PlayerLog>>,
    accept: bool,
    eos: Option<mpsc::UnboundedReceiver<()>>,
}

impl RecordingPlayer {
    pub fn new() -> (Self, Arc<Mutex<PlayerLog>>) {
        let log = Arc::new(Mutex::new(PlayerLog::default()));
        (
            Self {
                log: log.clone(),
                accept: true,
                eos: None,
            },
            log,
        )
    }

    pub fn refusing() -> (Self, Arc<Mutex<PlayerLog>>) {
        let (mut player, log) = Self::new();
        player.accept = false;
        (player, log)
    }

    /// Player whose end of stream is triggered by the returned sender.
    pub fn with_end_of_stream() -> (Self, Arc<Mutex<PlayerLog>>, mpsc::UnboundedSender<()>) {
        let (mut player, log) = Self::new();
        let (tx, rx) = mpsc::unbounded_channel();
        player.eos = Some(rx);
        (player, log, tx)
    }
}

impl Player for RecordingPlayer {
    fn play(&mut self, uri: &str) -> bool {
        let mut log = self.log.lock().unwrap();
        log.plays.push(uri.to_string());
        log.playing = self.accept;
        self.accept
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        log.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.log.lock().unwrap().playing
    }

    fn end_of_stream(&mut self) -> Option<mpsc::UnboundedReceiver<()>> {
        self.eos.take()
    }
}
