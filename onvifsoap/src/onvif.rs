//! ONVIF device, media and event operations
//!
//! Request bodies are plain [`Element`]s to be wrapped by
//! [`build_soap_request`](crate::build_soap_request); readers take the parsed
//! body of the response.

use xmltree::{Element, XMLNode};

use crate::builder::{child_element, text_element};
use crate::fault::extract_fault;
use crate::parser::{find_child, find_descendant, text_of, xml_children};
use crate::{SoapBody, SoapError, WSA_NS};

pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";
pub const EVENTS_NS: &str = "http://www.onvif.org/ver10/events/wsdl";
pub const WSNT_NS: &str = "http://docs.oasis-open.org/wsn/b-2";

pub const CREATE_PULL_POINT_ACTION: &str =
    "http://www.onvif.org/ver10/events/wsdl/EventPortType/CreatePullPointSubscriptionRequest";
pub const PULL_MESSAGES_ACTION: &str =
    "http://www.onvif.org/ver10/events/wsdl/PullPointSubscription/PullMessagesRequest";
pub const RENEW_ACTION: &str = "http://docs.oasis-open.org/wsn/bw-2/SubscriptionManager/RenewRequest";

/// Messages requested per `PullMessages` call.
pub const PULL_MESSAGE_LIMIT: u32 = 10;

/// Service addresses advertised by `GetCapabilities`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub media_xaddr: Option<String>,
    pub events_xaddr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaProfile {
    pub token: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReference {
    pub address: String,
}

/// `tt:SimpleItem` of a notification's data section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleItem {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl SimpleItem {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }
}

/// One pulled notification. `data` is `None` when the message carries no
/// `Data` element at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationMessage {
    pub data: Option<Vec<SimpleItem>>,
}

impl NotificationMessage {
    pub fn with_items(items: Vec<SimpleItem>) -> Self {
        Self { data: Some(items) }
    }

    pub fn without_data() -> Self {
        Self { data: None }
    }
}

/// Transport requested from `GetStreamUri`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    Rtsp,
    Udp,
    Http,
}

impl StreamProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamProtocol::Rtsp => "RTSP",
            StreamProtocol::Udp => "UDP",
            StreamProtocol::Http => "HTTP",
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn get_capabilities_request() -> Element {
    let mut request = child_element("tds:GetCapabilities", Some(DEVICE_NS));
    request
        .children
        .push(XMLNode::Element(text_element("tds:Category", "All")));
    request
}

pub fn get_profiles_request() -> Element {
    child_element("trt:GetProfiles", Some(MEDIA_NS))
}

pub fn get_stream_uri_request(profile_token: &str, protocol: StreamProtocol) -> Element {
    let mut request = child_element("trt:GetStreamUri", Some(MEDIA_NS));
    request
        .attributes
        .insert("xmlns:tt".to_string(), SCHEMA_NS.to_string());

    let mut transport = Element::new("tt:Transport");
    transport
        .children
        .push(XMLNode::Element(text_element("tt:Protocol", protocol.as_str())));

    let mut setup = Element::new("trt:StreamSetup");
    setup
        .children
        .push(XMLNode::Element(text_element("tt:Stream", "RTP-Unicast")));
    setup.children.push(XMLNode::Element(transport));

    request.children.push(XMLNode::Element(setup));
    request
        .children
        .push(XMLNode::Element(text_element("trt:ProfileToken", profile_token)));
    request
}

pub fn create_pull_point_subscription_request(initial_termination_time: &str) -> Element {
    let mut request = child_element("tev:CreatePullPointSubscription", Some(EVENTS_NS));
    request.children.push(XMLNode::Element(text_element(
        "tev:InitialTerminationTime",
        initial_termination_time,
    )));
    request
}

pub fn renew_request(termination_time: &str) -> Element {
    let mut request = child_element("wsnt:Renew", Some(WSNT_NS));
    request.children.push(XMLNode::Element(text_element(
        "wsnt:TerminationTime",
        termination_time,
    )));
    request
}

pub fn pull_messages_request() -> Element {
    let mut request = child_element("tev:PullMessages", Some(EVENTS_NS));
    request
        .children
        .push(XMLNode::Element(text_element("tev:Timeout", "PT0S")));
    request.children.push(XMLNode::Element(text_element(
        "tev:MessageLimit",
        &PULL_MESSAGE_LIMIT.to_string(),
    )));
    request
}

/// `wsa:Action` and `wsa:To` header blocks required by the event service.
pub fn addressing_headers(action: &str, to: &str) -> Vec<Element> {
    let mut action_el = text_element("wsa:Action", action);
    action_el
        .attributes
        .insert("xmlns:wsa".to_string(), WSA_NS.to_string());

    let mut to_el = text_element("wsa:To", to);
    to_el
        .attributes
        .insert("xmlns:wsa".to_string(), WSA_NS.to_string());

    vec![action_el, to_el]
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Returns the `name` response element, or the fault the body carries instead.
fn response_element<'a>(body: &'a SoapBody, name: &'static str) -> Result<&'a Element, SoapError> {
    if let Some(fault) = extract_fault(body) {
        return Err(SoapError::Fault(fault));
    }
    find_child(&body.content, name).ok_or(SoapError::MissingElement(name))
}

fn xaddr_of(capabilities: &Element, service: &str) -> Option<String> {
    find_child(capabilities, service)
        .and_then(|s| find_child(s, "XAddr"))
        .and_then(text_of)
        .filter(|addr| !addr.is_empty())
}

pub fn read_capabilities(body: &SoapBody) -> Result<Capabilities, SoapError> {
    let response = response_element(body, "GetCapabilitiesResponse")?;
    let capabilities =
        find_child(response, "Capabilities").ok_or(SoapError::MissingElement("Capabilities"))?;

    Ok(Capabilities {
        media_xaddr: xaddr_of(capabilities, "Media"),
        events_xaddr: xaddr_of(capabilities, "Events"),
    })
}

pub fn read_profiles(body: &SoapBody) -> Result<Vec<MediaProfile>, SoapError> {
    let response = response_element(body, "GetProfilesResponse")?;

    Ok(xml_children(response)
        .filter(|child| child.name == "Profiles")
        .filter_map(|profile| {
            let token = profile.attributes.get("token")?.clone();
            Some(MediaProfile {
                token,
                name: find_child(profile, "Name").and_then(text_of),
            })
        })
        .collect())
}

/// `None` when the response has no `MediaUri/Uri` element.
pub fn read_stream_uri(body: &SoapBody) -> Result<Option<String>, SoapError> {
    let response = response_element(body, "GetStreamUriResponse")?;

    Ok(find_child(response, "MediaUri")
        .and_then(|media| find_child(media, "Uri"))
        .map(|uri| text_of(uri).unwrap_or_default()))
}

pub fn read_subscription_reference(body: &SoapBody) -> Result<SubscriptionReference, SoapError> {
    let response = response_element(body, "CreatePullPointSubscriptionResponse")?;

    let address = find_child(response, "SubscriptionReference")
        .and_then(|reference| find_child(reference, "Address"))
        .and_then(text_of)
        .filter(|addr| !addr.is_empty())
        .ok_or(SoapError::MissingElement("SubscriptionReference/Address"))?;

    Ok(SubscriptionReference { address })
}

pub fn read_renew(body: &SoapBody) -> Result<(), SoapError> {
    response_element(body, "RenewResponse").map(|_| ())
}

pub fn read_notifications(body: &SoapBody) -> Result<Vec<NotificationMessage>, SoapError> {
    let response = response_element(body, "PullMessagesResponse")?;

    Ok(xml_children(response)
        .filter(|child| child.name == "NotificationMessage")
        .map(|notification| {
            let data = find_child(notification, "Message")
                .and_then(|message| find_descendant(message, "Data"))
                .map(|data| {
                    xml_children(data)
                        .filter(|item| item.name == "SimpleItem")
                        .map(|item| SimpleItem {
                            name: item.attributes.get("Name").cloned(),
                            value: item.attributes.get("Value").cloned(),
                        })
                        .collect()
                });
            NotificationMessage { data }
        })
        .collect())
}
