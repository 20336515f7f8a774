//! # SOAP layer for ONVIF
//!
//! This crate builds and parses the SOAP 1.2 envelopes exchanged with an
//! ONVIF device. It knows nothing about HTTP: callers post the strings
//! produced here and feed the response bytes back to the parsers.
//!
//! ## Features
//!
//! - SOAP 1.2 request envelopes with optional header blocks
//! - WS-Security UsernameToken (PasswordDigest) headers
//! - WS-Addressing `Action` / `To` headers for the event service
//! - Envelope parsing and SOAP 1.1 / 1.2 fault extraction
//! - Request bodies and response readers for the device, media and event
//!   operations used by the monitor
//!
//! ## Example
//!
//! ```ignore
//! use onvifsoap::{build_soap_request, onvif, parse_soap_envelope};
//!
//! let xml = build_soap_request(onvif::get_profiles_request(), Vec::new())?;
//! // ... POST `xml` to the media service ...
//! let envelope = parse_soap_envelope(response_bytes)?;
//! let profiles = onvif::read_profiles(&envelope.body)?;
//! ```

mod builder;
mod envelope;
mod fault;
mod parser;
mod security;

pub mod onvif;

pub use builder::{build_soap_request, child_element, text_element};
pub use envelope::{SoapBody, SoapEnvelope, SoapHeader};
pub use fault::{SoapFault, extract_fault};
pub use parser::{find_child, find_descendant, parse_soap_envelope, text_of, xml_children};
pub use security::UsernameToken;

/// SOAP 1.2 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Addressing namespace.
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";

/// Errors raised while building or reading SOAP documents.
#[derive(Debug, thiserror::Error)]
pub enum SoapError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] xmltree::ParseError),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] xmltree::Error),

    #[error("Serialized envelope is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("Missing {0} element in SOAP body")]
    MissingElement(&'static str),

    #[error("{0}")]
    Fault(SoapFault),
}
