//! # ONVIF motion monitor engine
//!
//! Discovers the live stream of an ONVIF camera, follows its motion events
//! through a pull-point subscription and drives a media player accordingly.
//!
//! ## Layout
//!
//! - [`gateway`]: the remote call seam ([`OnvifGateway`]) and its fault type
//! - [`soap_gateway`]: SOAP 1.2 / HTTP implementation of the gateway
//! - [`prober`]: GetCapabilities → GetProfiles → GetStreamUri discovery
//! - [`subscription`]: pull-point create / renew / pull and motion parsing
//! - [`scheduler`]: poll cadence and failure backoff
//! - [`motion_gate`]: motion → play/stop with a record window
//! - [`player`]: the [`Player`] seam and an external-command player
//! - [`session`]: the single-owner event loop tying the above together
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use onvifcontrol::{CommandPlayer, DeviceEndpoint, MonitorSession, SoapGateway};
//!
//! let endpoint = DeviceEndpoint::new("http://192.168.1.20/onvif/device_service");
//! let (session, ended) = MonitorSession::builder(
//!     endpoint,
//!     Arc::new(SoapGateway::default()),
//!     Box::new(CommandPlayer::default()),
//! )
//! .start();
//!
//! let err = ended.await?;
//! session.shutdown().await;
//! ```

pub mod errors;
pub mod gateway;
pub mod model;
pub mod motion_gate;
pub mod player;
pub mod prober;
pub mod scheduler;
pub mod session;
pub mod soap_gateway;
pub mod subscription;

pub use errors::{CallStep, MonitorError, NotificationFault};
pub use gateway::{GatewayFault, OnvifGateway, SharedGateway};
pub use model::{DeviceEndpoint, MediaUris};
pub use player::{CommandPlayer, Player};
pub use scheduler::{PollPolicy, RetryMode};
pub use session::{MonitorSession, MonitorSessionBuilder, SessionEvent};
pub use soap_gateway::SoapGateway;
pub use subscription::SubscriptionManager;
