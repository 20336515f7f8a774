//! [`OnvifGateway`] over SOAP 1.2 / HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use onvifsoap::{SoapBody, SoapError, UsernameToken, build_soap_request, onvif, parse_soap_envelope};
use tracing::debug;
use ureq::Agent;
use xmltree::Element;

use crate::gateway::{GatewayFault, OnvifGateway};
use crate::model::{Capabilities, MediaProfile, NotificationMessage, StreamProtocol, SubscriptionReference};

const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking ONVIF client.
///
/// When a username or a password is configured every request carries a
/// WS-Security UsernameToken with a fresh nonce.
pub struct SoapGateway {
    agent: Agent,
    username: Option<String>,
    password: Option<String>,
}

impl SoapGateway {
    pub fn new(timeout: Duration) -> Self {
        // 4xx/5xx must not turn into ureq errors: faults come back with a
        // 400/500 status and the body is what tells us why.
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: config.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    fn security_header(&self) -> Option<Element> {
        if self.username.is_none() && self.password.is_none() {
            return None;
        }
        let token = UsernameToken::digest(
            self.username.as_deref().unwrap_or(""),
            self.password.as_deref().unwrap_or(""),
        );
        Some(token.to_element())
    }

    /// Posts `xml` and returns the HTTP status and the raw body.
    fn post(&self, url: &str, xml: String) -> Result<(u16, String)> {
        let mut response = self
            .agent
            .post(url)
            .header("Content-Type", CONTENT_TYPE)
            .send(xml)
            .with_context(|| format!("HTTP error when sending SOAP request to {}", url))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read SOAP response body")?;

        Ok((status, body))
    }

    fn call<T>(
        &self,
        operation: &str,
        url: &str,
        request: Element,
        action: Option<&str>,
        read: impl FnOnce(&SoapBody) -> Result<T, SoapError>,
    ) -> Result<T, GatewayFault> {
        let mut headers = Vec::new();
        if let Some(action) = action {
            headers.extend(onvif::addressing_headers(action, url));
        }
        if let Some(security) = self.security_header() {
            headers.push(security);
        }

        let xml = build_soap_request(request, headers)
            .map_err(|e| GatewayFault::new(format!("cannot build {} request: {}", operation, e)))?;

        debug!(operation, url, "ONVIF call");

        let (status, body) = self
            .post(url, xml)
            .map_err(|e| GatewayFault::new(format!("{:#}", e)))?;
        let success = (200..300).contains(&status);

        let envelope = match parse_soap_envelope(body.as_bytes()) {
            Ok(envelope) => envelope,
            Err(_) if !success => {
                return Err(GatewayFault::with_status("HTTP error without SOAP fault", status));
            }
            Err(e) => {
                return Err(GatewayFault::new(format!("invalid SOAP response: {}", e)));
            }
        };

        match read(&envelope.body) {
            Ok(value) if success => Ok(value),
            Ok(_) => Err(GatewayFault::with_status(
                format!("{} answered with an error status", operation),
                status,
            )),
            Err(SoapError::Fault(fault)) => Err(GatewayFault {
                message: fault.to_string(),
                http_status: (!success).then_some(status),
            }),
            Err(e) => Err(GatewayFault {
                message: e.to_string(),
                http_status: (!success).then_some(status),
            }),
        }
    }
}

impl Default for SoapGateway {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl OnvifGateway for SoapGateway {
    fn get_capabilities(&self, device_url: &str) -> Result<Capabilities, GatewayFault> {
        self.call(
            "GetCapabilities",
            device_url,
            onvif::get_capabilities_request(),
            None,
            onvif::read_capabilities,
        )
    }

    fn get_profiles(&self, media_url: &str) -> Result<Vec<MediaProfile>, GatewayFault> {
        self.call(
            "GetProfiles",
            media_url,
            onvif::get_profiles_request(),
            None,
            onvif::read_profiles,
        )
    }

    fn get_stream_uri(
        &self,
        media_url: &str,
        profile_token: &str,
        protocol: StreamProtocol,
    ) -> Result<Option<String>, GatewayFault> {
        self.call(
            "GetStreamUri",
            media_url,
            onvif::get_stream_uri_request(profile_token, protocol),
            None,
            onvif::read_stream_uri,
        )
    }

    fn create_pull_point_subscription(
        &self,
        url: &str,
        initial_termination_time: &str,
    ) -> Result<SubscriptionReference, GatewayFault> {
        self.call(
            "CreatePullPointSubscription",
            url,
            onvif::create_pull_point_subscription_request(initial_termination_time),
            Some(onvif::CREATE_PULL_POINT_ACTION),
            onvif::read_subscription_reference,
        )
    }

    fn renew(&self, subscription_url: &str, termination_time: &str) -> Result<(), GatewayFault> {
        self.call(
            "Renew",
            subscription_url,
            onvif::renew_request(termination_time),
            Some(onvif::RENEW_ACTION),
            onvif::read_renew,
        )
    }

    fn pull_messages(&self, subscription_url: &str) -> Result<Vec<NotificationMessage>, GatewayFault> {
        self.call(
            "PullMessages",
            subscription_url,
            onvif::pull_messages_request(),
            Some(onvif::PULL_MESSAGES_ACTION),
            onvif::read_notifications,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_security_header_without_credentials() {
        let gateway = SoapGateway::default();
        assert!(gateway.security_header().is_none());
    }

    #[test]
    fn security_header_with_password_only() {
        let gateway = SoapGateway::default().with_credentials(None, Some("secret".to_string()));
        let header = gateway.security_header().unwrap();
        assert_eq!(header.name, "wsse:Security");

        let username = header
            .get_child("wsse:UsernameToken")
            .and_then(|token| token.get_child("wsse:Username"))
            .and_then(|user| user.get_text())
            .map(|text| text.to_string())
            .unwrap_or_default();
        assert_eq!(username, "");
    }

    #[test]
    fn unreachable_device_is_a_gateway_fault() {
        let gateway = SoapGateway::new(Duration::from_millis(200));
        let fault = gateway
            .get_capabilities("http://127.0.0.1:9/onvif/device_service")
            .unwrap_err();
        assert!(fault.http_status.is_none());
        assert!(fault.message.contains("127.0.0.1:9"));
    }
}
