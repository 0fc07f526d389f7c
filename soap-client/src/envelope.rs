//! SOAP envelope encoding and decoding.
//!
//! Requests are rendered straight to text; responses are parsed into an
//! [`xmltree::Element`] and the `<action>Response` element is handed back.

use quick_xml::escape::escape;
use xmltree::Element;

use crate::SoapError;

/// Namespace of the SOAP 1.1 envelope.
pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// Encoding style attribute value used by UPnP control points.
pub const ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Build the request envelope for `action` on `service_type`.
///
/// Each argument becomes a child element of the action element, in order, with
/// its value escaped as text. An empty argument list still produces the action
/// element; devices reject envelopes where it is missing.
pub fn encode(service_type: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut payload = String::new();
    for (name, value) in args {
        payload.push_str(&format!("<{name}>{}</{name}>", escape(*value)));
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="{ENVELOPE_NS}" s:encodingStyle="{ENCODING_STYLE}"><s:Body><u:{action} xmlns:u="{service_type}">{payload}</u:{action}></s:Body></s:Envelope>"#
    )
}

/// Extract the `<action>Response` element from a response envelope.
///
/// A SOAP fault in the body is reported as [`SoapError::Fault`] with the UPnP
/// error code (500 when the device omits one).
pub fn decode(xml: &str, action: &str) -> Result<Element, SoapError> {
    let envelope =
        Element::parse(xml.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;
    extract_response(&envelope, action)
}

pub(crate) fn extract_response(envelope: &Element, action: &str) -> Result<Element, SoapError> {
    let body = envelope
        .get_child("Body")
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if let Some(fault) = body.get_child("Fault") {
        return Err(SoapError::Fault(upnp_error_code(fault)));
    }

    let response_name = format!("{action}Response");
    body.get_child(response_name.as_str())
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {response_name} element")))
}

/// UPnP error code of a fault envelope, if `xml` is one.
///
/// Devices usually send faults with HTTP 500, so callers check error bodies
/// with this before treating them as plain status failures.
pub fn fault_code(xml: &str) -> Option<u16> {
    let envelope = Element::parse(xml.as_bytes()).ok()?;
    let fault = envelope.get_child("Body")?.get_child("Fault")?;
    Some(upnp_error_code(fault))
}

fn upnp_error_code(fault: &Element) -> u16 {
    fault
        .get_child("detail")
        .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")))
        .and_then(|e| e.get_child("errorCode"))
        .and_then(|c| c.get_text())
        .and_then(|t| t.trim().parse::<u16>().ok())
        .unwrap_or(500)
}

/// Text content of a named child of a response element, if present.
pub fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.into_owned())
}
