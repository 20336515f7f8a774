//! SOAP faults returned by devices

use std::fmt;

use crate::SoapBody;
use crate::parser::{find_child, find_descendant, text_of};

/// SOAP fault (1.1 or 1.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Fault code, with the subcode appended when present
    /// (ex: "env:Sender/ter:NotAuthorized")
    pub fault_code: String,

    /// Human readable reason
    pub fault_string: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fault_code.is_empty() {
            write!(f, "{}", self.fault_string)
        } else {
            write!(f, "{} ({})", self.fault_string, self.fault_code)
        }
    }
}

/// Returns the fault carried by `body`, if the body holds one.
pub fn extract_fault(body: &SoapBody) -> Option<SoapFault> {
    let fault = find_child(&body.content, "Fault")?;

    // SOAP 1.2: Code/Value (+ Subcode/Value), Reason/Text
    // SOAP 1.1: faultcode, faultstring
    let mut fault_code = find_child(fault, "Code")
        .and_then(|code| find_child(code, "Value"))
        .and_then(text_of)
        .or_else(|| find_child(fault, "faultcode").and_then(text_of))
        .unwrap_or_default();

    if let Some(subcode) = find_child(fault, "Code")
        .and_then(|code| find_child(code, "Subcode"))
        .and_then(|sub| find_descendant(sub, "Value"))
        .and_then(text_of)
    {
        fault_code = format!("{}/{}", fault_code, subcode);
    }

    let fault_string = find_child(fault, "Reason")
        .and_then(|reason| find_child(reason, "Text"))
        .and_then(text_of)
        .or_else(|| find_child(fault, "faultstring").and_then(text_of))
        .unwrap_or_else(|| "SOAP fault without reason".to_string());

    Some(SoapFault {
        fault_code,
        fault_string,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_soap_envelope;

    #[test]
    fn test_extract_soap12_fault() {
        let xml = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:ter="http://www.onvif.org/ver10/error">
  <env:Body>
    <env:Fault>
      <env:Code>
        <env:Value>env:Sender</env:Value>
        <env:Subcode><env:Value>ter:NotAuthorized</env:Value></env:Subcode>
      </env:Code>
      <env:Reason><env:Text xml:lang="en">Sender not Authorized</env:Text></env:Reason>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;

        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        let fault = extract_fault(&envelope.body).unwrap();
        assert_eq!(fault.fault_code, "env:Sender/ter:NotAuthorized");
        assert_eq!(fault.fault_string, "Sender not Authorized");
    }

    #[test]
    fn test_extract_soap11_fault() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>Action Failed</faultstring>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        let fault = extract_fault(&envelope.body).unwrap();
        assert_eq!(fault.fault_code, "s:Client");
        assert_eq!(fault.to_string(), "Action Failed (s:Client)");
    }

    #[test]
    fn test_no_fault_in_regular_body() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body><RenewResponse/></s:Body></s:Envelope>"#;
        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        assert!(extract_fault(&envelope.body).is_none());
    }
}
