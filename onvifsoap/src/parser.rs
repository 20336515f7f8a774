//! SOAP response parsing and tree helpers

use std::io::BufReader;

use xmltree::{Element, XMLNode};

use crate::{SoapBody, SoapEnvelope, SoapError, SoapHeader};

/// Parses a complete SOAP envelope from raw bytes.
///
/// Element names are matched on their local part, so both SOAP 1.1 and
/// SOAP 1.2 envelopes are accepted whatever prefix the device picked.
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapError> {
    let reader = BufReader::new(xml);
    let root = Element::parse(reader)?;

    if root.name != "Envelope" {
        return Err(SoapError::MissingEnvelope);
    }

    let header = find_child(&root, "Header").map(|e| SoapHeader { content: e.clone() });

    let body = find_child(&root, "Body").ok_or(SoapError::MissingBody)?;

    Ok(SoapEnvelope {
        header,
        body: SoapBody {
            content: body.clone(),
        },
    })
}

/// Iterates over the element children of `element`, skipping text and comments.
pub fn xml_children(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(elem) => Some(elem),
        _ => None,
    })
}

/// First direct child whose local name is `name`.
pub fn find_child<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    xml_children(element).find(|child| child.name == name)
}

/// Depth-first search for the first descendant whose local name is `name`.
pub fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    for child in xml_children(element) {
        if child.name == name {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, name) {
            return Some(found);
        }
    }
    None
}

/// Trimmed text content of `element`, if any.
pub fn text_of(element: &Element) -> Option<String> {
    element
        .get_text()
        .map(|text| text.trim().to_string())
}
