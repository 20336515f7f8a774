mod logs;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use onvifconfig::Config;
use onvifcontrol::{
    CommandPlayer, DeviceEndpoint, MonitorSession, PollPolicy, RetryMode, SharedGateway,
    SoapGateway,
};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Everything needed to start a fresh session, read once from the
/// configuration.
struct MonitorSettings {
    endpoint: DeviceEndpoint,
    gateway: SharedGateway,
    player_command: Vec<String>,
    track_motion: bool,
    preview_duration: Option<Duration>,
    poll_policy: PollPolicy,
    reconnect_min: Duration,
    reconnect_max: Duration,
}

impl MonitorSettings {
    fn from_config(config: &Config) -> Result<Self> {
        let endpoint = DeviceEndpoint::new(config.get_device_url()?).with_credentials(
            config.get_device_username(),
            config.get_device_password(),
        );

        let gateway = SoapGateway::new(config.get_network_timeout()?)
            .with_credentials(endpoint.username.clone(), endpoint.password.clone());

        let retry_mode = config
            .get_polling_retry_mode()?
            .parse::<RetryMode>()
            .unwrap_or_else(|e| {
                warn!("⚠️ {}, falling back to exponential backoff", e);
                RetryMode::default()
            });

        Ok(Self {
            endpoint,
            gateway: Arc::new(gateway),
            player_command: config.get_player_command()?,
            track_motion: config.get_motion_track()?,
            preview_duration: config.get_motion_preview_duration()?,
            poll_policy: PollPolicy {
                interval: config.get_polling_interval()?,
                backoff_cap: config.get_polling_backoff_cap()?,
                retry_mode,
            },
            reconnect_min: config.get_reconnect_min_delay()?,
            reconnect_max: config.get_reconnect_max_delay()?,
        })
    }

    fn start_session(&self) -> (MonitorSession, oneshot::Receiver<onvifcontrol::MonitorError>) {
        MonitorSession::builder(
            self.endpoint.clone(),
            self.gateway.clone(),
            Box::new(CommandPlayer::new(self.player_command.clone())),
        )
        .track_motion(self.track_motion)
        .preview_duration(self.preview_duration)
        .poll_policy(self.poll_policy)
        .start()
    }

    /// Uniformly random delay in `[reconnect_min, reconnect_max]`.
    fn reconnect_delay(&self) -> Duration {
        if self.reconnect_max <= self.reconnect_min {
            return self.reconnect_min;
        }
        Duration::from_secs_f64(rand::random_range(
            self.reconnect_min.as_secs_f64()..=self.reconnect_max.as_secs_f64(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let directory = std::env::args().nth(1).unwrap_or_default();
    let config = Config::load_config(&directory)?;
    logs::init_logging(&config);

    let settings = MonitorSettings::from_config(&config)?;

    info!(
        device = %settings.endpoint.url,
        track_motion = settings.track_motion,
        "🎥 Starting ONVIF monitor"
    );
    info!("Press Ctrl+C to stop...");

    loop {
        let (session, ended) = settings.start_session();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutting down...");
                session.shutdown().await;
                return Ok(());
            }
            result = ended => {
                match result {
                    Ok(err) => error!(error = %err, "❌ Session ended"),
                    Err(_) => warn!("Session stopped without reporting a cause"),
                }
                session.shutdown().await;
            }
        }

        let delay = settings.reconnect_delay();
        info!(delay_ms = delay.as_millis() as u64, "🔄 Reconnecting");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutting down...");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
