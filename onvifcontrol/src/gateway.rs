//! Remote call seam between the engine and the ONVIF device.
//!
//! Every method is one blocking SOAP operation. Implementations are shared
//! between the session task and its blocking workers, hence `Send + Sync`.

use std::fmt;
use std::sync::Arc;

use crate::model::{Capabilities, MediaProfile, NotificationMessage, StreamProtocol, SubscriptionReference};

/// Lifetime requested for pull-point subscriptions, on creation and renewal.
pub const SUBSCRIPTION_TERMINATION_TIME: &str = "PT1M";

/// What a failed remote call yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFault {
    pub message: String,
    pub http_status: Option<u16>,
}

impl GatewayFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            http_status: Some(status),
        }
    }
}

impl fmt::Display for GatewayFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (HTTP status {})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for GatewayFault {}

pub trait OnvifGateway: Send + Sync {
    fn get_capabilities(&self, device_url: &str) -> Result<Capabilities, GatewayFault>;

    fn get_profiles(&self, media_url: &str) -> Result<Vec<MediaProfile>, GatewayFault>;

    /// `Ok(None)` when the response carries no media URI.
    fn get_stream_uri(
        &self,
        media_url: &str,
        profile_token: &str,
        protocol: StreamProtocol,
    ) -> Result<Option<String>, GatewayFault>;

    fn create_pull_point_subscription(
        &self,
        url: &str,
        initial_termination_time: &str,
    ) -> Result<SubscriptionReference, GatewayFault>;

    fn renew(&self, subscription_url: &str, termination_time: &str) -> Result<(), GatewayFault>;

    fn pull_messages(&self, subscription_url: &str) -> Result<Vec<NotificationMessage>, GatewayFault>;
}

pub type SharedGateway = Arc<dyn OnvifGateway>;
