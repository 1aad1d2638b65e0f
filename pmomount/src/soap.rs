//! Enveloppes SOAP des actions UPnP : lecture des requêtes, écriture des
//! réponses et des fautes.
//!
//! ```
//! use pmomount::soap::{parse_soap_action, build_soap_response};
//!
//! let body = r#"<?xml version="1.0"?>
//! <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
//!   <s:Body>
//!     <u:GetSystemUpdateID xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"/>
//!   </s:Body>
//! </s:Envelope>"#;
//!
//! let action = parse_soap_action(body.as_bytes()).unwrap();
//! assert_eq!(action.name, "GetSystemUpdateID");
//!
//! let xml = build_soap_response(
//!     "urn:schemas-upnp-org:service:ContentDirectory:1",
//!     "GetSystemUpdateID",
//!     vec![("Id".to_string(), "3".to_string())],
//! ).unwrap();
//! assert!(xml.contains("<Id>3</Id>"));
//! ```

use std::collections::HashMap;
use xmltree::{Element, EmitterConfig, XMLNode};

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

/// Codes d'erreur UPnP utilisés dans les fautes
pub mod error_codes {
    pub const INVALID_ACTION: &str = "401";
    pub const INVALID_ARGS: &str = "402";
    /// ContentDirectory : objet inexistant
    pub const NO_SUCH_OBJECT: &str = "701";
}

/// Action UPnP extraite d'une enveloppe SOAP
#[derive(Debug, Clone)]
pub struct SoapAction {
    /// Nom local de l'action (ex: "Browse")
    pub name: String,

    /// Namespace du service
    pub namespace: Option<String>,

    pub args: HashMap<String, String>,
}

impl SoapAction {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    /// Arguments triés par nom, sous forme `nom=valeur` séparés par `&`.
    pub fn canonical_args(&self) -> String {
        let mut args: Vec<_> = self.args.iter().collect();
        args.sort();
        args.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("No action found in SOAP Body")]
    NoAction,
}

/// Lit l'action contenue dans le corps d'une enveloppe SOAP.
pub fn parse_soap_action(xml: &[u8]) -> Result<SoapAction, SoapParseError> {
    let root = Element::parse(xml)?;
    if root.name != "Envelope" {
        return Err(SoapParseError::MissingEnvelope);
    }

    let body = child_elements(&root)
        .find(|e| e.name == "Body")
        .ok_or(SoapParseError::MissingBody)?;

    let action = child_elements(body).next().ok_or(SoapParseError::NoAction)?;

    let args = child_elements(action)
        .map(|arg| {
            let value = arg.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (arg.name.clone(), value)
        })
        .collect();

    Ok(SoapAction {
        name: action.name.clone(),
        namespace: action.namespace.clone(),
        args,
    })
}

fn child_elements(elem: &Element) -> impl Iterator<Item = &Element> {
    elem.children.iter().filter_map(XMLNode::as_element)
}

fn text_element(name: &str, text: impl Into<String>) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.into()));
    elem
}

fn wrap_in_envelope(payload: Element, with_encoding: bool) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(payload));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), ENVELOPE_NS.to_string());
    if with_encoding {
        envelope
            .attributes
            .insert("s:encodingStyle".to_string(), ENCODING_STYLE.to_string());
    }
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(false);
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Construit la réponse `u:<action>Response` avec ses valeurs de sortie.
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: Vec<(String, String)>,
) -> Result<String, xmltree::Error> {
    let mut response = Element::new(&format!("u:{}Response", action));
    response
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (key, value) in values {
        response.children.push(XMLNode::Element(text_element(&key, value)));
    }

    wrap_in_envelope(response, true)
}

/// Construit une faute SOAP portant une erreur UPnP.
pub fn build_soap_fault(error_code: &str, error_description: &str) -> Result<String, xmltree::Error> {
    let mut upnp_error = Element::new("UPnPError");
    upnp_error
        .attributes
        .insert("xmlns".to_string(), CONTROL_NS.to_string());
    upnp_error
        .children
        .push(XMLNode::Element(text_element("errorCode", error_code)));
    upnp_error
        .children
        .push(XMLNode::Element(text_element("errorDescription", error_description)));

    let mut detail = Element::new("detail");
    detail.children.push(XMLNode::Element(upnp_error));

    let mut fault = Element::new("s:Fault");
    fault
        .children
        .push(XMLNode::Element(text_element("faultcode", "s:Client")));
    fault
        .children
        .push(XMLNode::Element(text_element("faultstring", "UPnPError")));
    fault.children.push(XMLNode::Element(detail));

    wrap_in_envelope(fault, false)
}
