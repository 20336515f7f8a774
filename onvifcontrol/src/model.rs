pub use onvifsoap::onvif::{
    Capabilities, MediaProfile, NotificationMessage, SimpleItem, StreamProtocol,
    SubscriptionReference,
};

/// Device to monitor, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DeviceEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }
}

/// Result of device discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUris {
    pub media_endpoint_uri: String,
    pub stream_uri: String,
}
