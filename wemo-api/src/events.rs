//! Decoding of GENA push notifications into typed device events.
//!
//! A notification body is a property set:
//!
//! ```xml
//! <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
//!   <e:property><BinaryState>1</BinaryState></e:property>
//! </e:propertyset>
//! ```
//!
//! Every property is looked up in a fixed decode table ([`PropertyKind`]).
//! Unknown property names are logged and skipped; so are values that fail
//! their decode rule. Neither aborts the rest of the notification.

use std::borrow::Cow;

use quick_xml::escape::unescape;
use tracing::{debug, warn};
use xmltree::{Element, XMLNode};

use crate::error::{ApiError, Result};

/// Power metering snapshot reported by Insight switches.
///
/// Decoded from the pipe-delimited `InsightParams` string; positions 0, 1, 2,
/// 3, 7 and 8 are used.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightParams {
    /// Switch state; 8 means on but idle (standby)
    pub binary_state: u8,
    /// Epoch seconds of the last state change
    pub on_since: u64,
    /// Seconds on in the current session
    pub on_for: u64,
    /// Seconds on today
    pub today_on_time: u64,
    /// Instantaneous power draw in mW
    pub instant_power: f64,
    /// Energy used today in mW-minutes
    pub today_consumed: f64,
}

impl InsightParams {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.trim().split('|').collect();
        if fields.len() < 9 {
            return Err(ApiError::protocol(format!(
                "InsightParams has {} fields, expected at least 9",
                fields.len()
            )));
        }

        Ok(Self {
            binary_state: parse_field(fields[0], "binary state")?,
            on_since: parse_field(fields[1], "on since")?,
            on_for: parse_field(fields[2], "on for")?,
            today_on_time: parse_field(fields[3], "today on time")?,
            instant_power: parse_field(fields[7], "instant power")?,
            today_consumed: parse_field(fields[8], "today consumed")?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ApiError::protocol(format!("invalid {what} value '{raw}'")))
}

/// One entry of an attribute list (Maker, Humidifier, Heater).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Previous value; only present in push notifications
    pub prevalue: Option<String>,
    /// Change timestamp; only present in push notifications
    pub ts: Option<String>,
}

/// Typed events decoded from push notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    BinaryState(u8),
    Brightness(u8),
    /// A capability of a bridge sub-device changed
    StatusChange {
        device_id: String,
        capability_id: String,
        value: String,
    },
    InsightParams(InsightParams),
    /// One changed attribute; an attribute list yields one event per entry
    Attribute(Attribute),
}

/// Decode table keyed by property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    BinaryState,
    Brightness,
    StatusChange,
    InsightParams,
    AttributeList,
    Unhandled,
}

impl PropertyKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "BinaryState" => PropertyKind::BinaryState,
            "Brightness" => PropertyKind::Brightness,
            "StatusChange" => PropertyKind::StatusChange,
            "InsightParams" => PropertyKind::InsightParams,
            "attributeList" => PropertyKind::AttributeList,
            _ => PropertyKind::Unhandled,
        }
    }

    /// Apply this property's decode rule to a raw value.
    pub fn decode(&self, value: &str) -> Result<Vec<DeviceEvent>> {
        match self {
            PropertyKind::BinaryState => {
                Ok(vec![DeviceEvent::BinaryState(parse_binary_state(value)?)])
            }
            PropertyKind::Brightness => Ok(vec![DeviceEvent::Brightness(parse_field(
                value,
                "brightness",
            )?)]),
            PropertyKind::StatusChange => decode_status_change(value).map(|event| vec![event]),
            PropertyKind::InsightParams => {
                Ok(vec![DeviceEvent::InsightParams(InsightParams::parse(value)?)])
            }
            PropertyKind::AttributeList => Ok(parse_attribute_list(value)?
                .into_iter()
                .map(DeviceEvent::Attribute)
                .collect()),
            PropertyKind::Unhandled => Ok(Vec::new()),
        }
    }
}

/// Decode a notification body into events, in document order.
///
/// # Errors
///
/// Only a body that is not a property set at all is an error. Individual
/// properties that cannot be decoded are skipped.
pub fn decode_notification(body: &str) -> Result<Vec<DeviceEvent>> {
    let root = Element::parse(body.as_bytes())
        .map_err(|e| ApiError::protocol(format!("invalid notification body: {e}")))?;
    if root.name != "propertyset" {
        return Err(ApiError::protocol(format!(
            "expected propertyset, found {}",
            root.name
        )));
    }

    let mut events = Vec::new();
    for property in child_elements(&root).filter(|e| e.name == "property") {
        for variable in child_elements(property) {
            let value = variable.get_text().unwrap_or(Cow::Borrowed(""));
            let kind = PropertyKind::from_name(&variable.name);
            if kind == PropertyKind::Unhandled {
                debug!(property = %variable.name, "Unhandled event property");
                continue;
            }

            match kind.decode(&value) {
                Ok(decoded) => events.extend(decoded),
                Err(e) => warn!(property = %variable.name, error = %e, "Failed to decode event property"),
            }
        }
    }

    Ok(events)
}

/// First `|`-separated field of a `BinaryState` value.
pub fn parse_binary_state(raw: &str) -> Result<u8> {
    let first = raw.split('|').next().unwrap_or_default();
    parse_field(first, "binary state")
}

fn decode_status_change(raw: &str) -> Result<DeviceEvent> {
    let doc = Element::parse(raw.as_bytes())
        .map_err(|e| ApiError::protocol(format!("invalid StateEvent document: {e}")))?;

    let text = |name: &str| -> Result<String> {
        doc.get_child(name)
            .and_then(|c| c.get_text())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ApiError::protocol(format!("StateEvent is missing {name}")))
    };

    Ok(DeviceEvent::StatusChange {
        device_id: text("DeviceID")?,
        capability_id: text("CapabilityId")?,
        value: text("Value")?,
    })
}

/// Parse an attribute list fragment (`<attribute>...</attribute>...`).
///
/// Devices sometimes escape the fragment twice; a remaining layer of entity
/// escaping is removed before parsing.
pub fn parse_attribute_list(raw: &str) -> Result<Vec<Attribute>> {
    let fragment: Cow<'_, str> = if raw.contains("&lt;") {
        unescape(raw).map_err(|e| ApiError::protocol(format!("invalid attribute list: {e}")))?
    } else {
        Cow::Borrowed(raw)
    };

    let wrapped = format!("<attributeList>{fragment}</attributeList>");
    let list = Element::parse(wrapped.as_bytes())
        .map_err(|e| ApiError::protocol(format!("invalid attribute list: {e}")))?;

    child_elements(&list)
        .filter(|e| e.name == "attribute")
        .map(|attribute| -> Result<Attribute> {
            let text = |name: &str| {
                attribute
                    .get_child(name)
                    .and_then(|c| c.get_text())
                    .map(|t| t.into_owned())
            };
            Ok(Attribute {
                name: text("name")
                    .ok_or_else(|| ApiError::protocol("attribute without name"))?,
                value: text("value").unwrap_or_default(),
                prevalue: text("prevalue"),
                ts: text("ts"),
            })
        })
        .collect()
}

/// Render attributes as the fragment expected by `SetAttributes`.
pub fn render_attribute_list(attributes: &[(&str, &str)]) -> String {
    attributes
        .iter()
        .map(|(name, value)| {
            format!(
                "<attribute><name>{}</name><value>{}</value></attribute>",
                quick_xml::escape::escape(*name),
                quick_xml::escape::escape(*value)
            )
        })
        .collect()
}

pub(crate) fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    })
}
