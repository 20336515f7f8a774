//! WS-Security UsernameToken with PasswordDigest

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};
use xmltree::{Element, XMLNode};

use crate::builder::text_element;

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const BASE64_ENCODING_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// A ready-to-send UsernameToken.
///
/// PasswordDigest = Base64(SHA1(nonce + created + password)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameToken {
    pub username: String,
    pub password_digest: String,
    pub nonce: String,
    pub created: String,
}

impl UsernameToken {
    /// Creates a token with a fresh random nonce, stamped now.
    pub fn digest(username: &str, password: &str) -> Self {
        let nonce: [u8; 16] = rand::random();
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        Self::with_nonce(username, password, &nonce, &created)
    }

    /// Creates a token from an explicit nonce and creation timestamp.
    pub fn with_nonce(username: &str, password: &str, nonce: &[u8], created: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();

        Self {
            username: username.to_string(),
            password_digest: STANDARD.encode(digest),
            nonce: STANDARD.encode(nonce),
            created: created.to_string(),
        }
    }

    /// `<wsse:Security>` header block.
    pub fn to_element(&self) -> Element {
        let mut security = Element::new("wsse:Security");
        security
            .attributes
            .insert("xmlns:wsse".to_string(), WSSE_NS.to_string());
        security
            .attributes
            .insert("xmlns:wsu".to_string(), WSU_NS.to_string());

        let mut token = Element::new("wsse:UsernameToken");
        token
            .children
            .push(XMLNode::Element(text_element("wsse:Username", &self.username)));

        let mut password = text_element("wsse:Password", &self.password_digest);
        password
            .attributes
            .insert("Type".to_string(), PASSWORD_DIGEST_TYPE.to_string());
        token.children.push(XMLNode::Element(password));

        let mut nonce = text_element("wsse:Nonce", &self.nonce);
        nonce
            .attributes
            .insert("EncodingType".to_string(), BASE64_ENCODING_TYPE.to_string());
        token.children.push(XMLNode::Element(nonce));

        token
            .children
            .push(XMLNode::Element(text_element("wsu:Created", &self.created)));

        security.children.push(XMLNode::Element(token));
        security
    }
}
