//! SOAP request construction

use xmltree::{Element, XMLNode};

use crate::{SOAP_ENV_NS, SoapError};

/// Builds an element with an optional `xmlns:prefix` declaration.
///
/// `name` carries its prefix (`"tds:GetCapabilities"`); when `namespace` is
/// given the prefix is bound to it on this element.
pub fn child_element(name: &str, namespace: Option<&str>) -> Element {
    let mut element = Element::new(name);
    if let (Some(ns), Some((prefix, _))) = (namespace, name.split_once(':')) {
        element
            .attributes
            .insert(format!("xmlns:{}", prefix), ns.to_string());
    }
    element
}

/// Builds `<name>text</name>`.
pub fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

/// Wraps `body_child` in a SOAP 1.2 envelope.
///
/// `header_blocks` are emitted in order inside `<s:Header>`; the header is
/// omitted entirely when the list is empty.
pub fn build_soap_request(
    body_child: Element,
    header_blocks: Vec<Element>,
) -> Result<String, SoapError> {
    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENV_NS.to_string());

    if !header_blocks.is_empty() {
        let mut header = Element::new("s:Header");
        header
            .children
            .extend(header_blocks.into_iter().map(XMLNode::Element));
        envelope.children.push(XMLNode::Element(header));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(body_child));
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = xmltree::EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8(buf)?)
}
