//! Pull-point subscription lifecycle and motion extraction.
//!
//! The manager is owned by exactly one party at a time: the session loop
//! between polls, the blocking worker during a poll. [`SubscriptionManager::poll`]
//! takes it by value and hands it back with the result.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{CallStep, MonitorError, NotificationFault};
use crate::gateway::{OnvifGateway, SUBSCRIPTION_TERMINATION_TIME, SharedGateway};
use crate::model::NotificationMessage;

/// Age after which a subscription is renewed before pulling.
pub const RENEWAL_THRESHOLD: Duration = Duration::from_secs(30);

const MOTION_ITEM: &str = "IsMotion";

#[derive(Debug, Clone)]
struct ActiveSubscription {
    address: String,
    confirmed_at: Instant,
}

#[derive(Debug)]
pub struct SubscriptionManager {
    media_endpoint_uri: String,
    active: Option<ActiveSubscription>,
}

impl SubscriptionManager {
    pub fn new(media_endpoint_uri: impl Into<String>) -> Self {
        Self {
            media_endpoint_uri: media_endpoint_uri.into(),
            active: None,
        }
    }

    pub fn media_endpoint_uri(&self) -> &str {
        &self.media_endpoint_uri
    }

    pub fn subscription_address(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.address.as_str())
    }

    pub fn has_subscription(&self) -> bool {
        self.active.is_some()
    }

    /// One poll cycle at instant `now`: create or renew the subscription as
    /// needed, pull, and return the motion flag.
    ///
    /// Blocking. A renewal failure drops the subscription so the next cycle
    /// creates a new one; a pull failure keeps it.
    pub fn pull_cycle(
        &mut self,
        gateway: &dyn OnvifGateway,
        now: Instant,
        cancel: &CancellationToken,
    ) -> Result<bool, MonitorError> {
        check_cancelled(cancel)?;

        let address = match self.active.take() {
            None => {
                let reference = gateway
                    .create_pull_point_subscription(
                        &self.media_endpoint_uri,
                        SUBSCRIPTION_TERMINATION_TIME,
                    )
                    .map_err(|fault| {
                        MonitorError::transport(CallStep::CreatePullPointSubscription, fault)
                    })?;
                info!(address = %reference.address, "pull point subscription created");
                reference.address
            }
            Some(active) if now.duration_since(active.confirmed_at) >= RENEWAL_THRESHOLD => {
                gateway
                    .renew(&active.address, SUBSCRIPTION_TERMINATION_TIME)
                    .map_err(|fault| {
                        warn!(address = %active.address, "subscription renewal failed, dropping it");
                        MonitorError::transport(CallStep::Renew, fault)
                    })?;
                debug!(address = %active.address, "subscription renewed");
                active.address
            }
            Some(active) => {
                self.active = Some(active);
                return self.pull(gateway, cancel);
            }
        };

        self.active = Some(ActiveSubscription {
            address,
            confirmed_at: now,
        });
        self.pull(gateway, cancel)
    }

    fn pull(
        &self,
        gateway: &dyn OnvifGateway,
        cancel: &CancellationToken,
    ) -> Result<bool, MonitorError> {
        check_cancelled(cancel)?;

        let address = self
            .subscription_address()
            .ok_or_else(|| MonitorError::Worker("pull without subscription".to_string()))?;

        let messages = gateway
            .pull_messages(address)
            .map_err(|fault| MonitorError::transport(CallStep::PullMessages, fault))?;
        debug!(count = messages.len(), "notifications pulled");

        motion_from_notifications(&messages)
    }

    /// Runs [`pull_cycle`](Self::pull_cycle) on a blocking worker and gives
    /// the manager back with the result.
    pub async fn poll(
        mut self,
        gateway: SharedGateway,
        cancel: CancellationToken,
    ) -> (SubscriptionManager, Result<bool, MonitorError>) {
        let media_endpoint_uri = self.media_endpoint_uri.clone();
        let now = Instant::now();

        let worker = tokio::task::spawn_blocking(move || {
            let result = self.pull_cycle(gateway.as_ref(), now, &cancel);
            (self, result)
        });

        match worker.await {
            Ok(outcome) => outcome,
            // Manager lost with the worker: start over without a subscription.
            Err(e) => (
                SubscriptionManager::new(media_endpoint_uri),
                Err(MonitorError::Worker(e.to_string())),
            ),
        }
    }
}

/// Scans a pulled batch for the motion flag.
///
/// A message without data is rejected at once; otherwise the first
/// `IsMotion` item holding a valid boolean wins.
pub fn motion_from_notifications(messages: &[NotificationMessage]) -> Result<bool, MonitorError> {
    for message in messages {
        let items = message
            .data
            .as_ref()
            .ok_or(MonitorError::malformed(NotificationFault::NoDataElement))?;

        let motion = items
            .iter()
            .filter(|item| item.name.as_deref() == Some(MOTION_ITEM))
            .find_map(|item| item.value.as_deref().and_then(parse_xsd_boolean));

        if let Some(motion) = motion {
            return Ok(motion);
        }
    }

    Err(MonitorError::malformed(NotificationFault::NoMotionItem))
}

fn parse_xsd_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), MonitorError> {
    if cancel.is_cancelled() {
        Err(MonitorError::Cancelled)
    } else {
        Ok(())
    }
}
