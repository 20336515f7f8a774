//! SOAP envelope structures

use xmltree::Element;

/// Complete SOAP envelope
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Optional SOAP header
    pub header: Option<SoapHeader>,

    /// SOAP body holding the operation response or a fault
    pub body: SoapBody,
}

/// SOAP header
#[derive(Debug, Clone)]
pub struct SoapHeader {
    pub content: Element,
}

/// SOAP body
#[derive(Debug, Clone)]
pub struct SoapBody {
    pub content: Element,
}

impl SoapBody {
    /// First element child of the body, usually `<XxxResponse>`.
    pub fn payload(&self) -> Option<&Element> {
        self.content.children.iter().find_map(|n| n.as_element())
    }
}
