//! Bridge sub-devices (bulbs and groups) and the embedded documents the
//! bridge service exchanges about them.

use quick_xml::escape::escape;
use xmltree::Element;

use crate::capability::CapabilityMap;
use crate::error::{ApiError, Result};
use crate::events::child_elements;

/// Capability controlling on/off state
pub const CAPABILITY_ON_OFF: &str = "10006";
/// Capability controlling brightness (`level:transition`)
pub const CAPABILITY_BRIGHTNESS: &str = "10008";
/// Capability controlling color (`x:y:transition`)
pub const CAPABILITY_COLOR: &str = "10300";

/// Group identifiers are exactly this long; device identifiers are not.
const GROUP_ID_LEN: usize = 10;

/// Light class derived from the advertised capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Neither brightness nor color capability
    Basic,
    DimmableLight,
    ColorLight,
}

impl DeviceClass {
    /// Color wins over dimmable when both capabilities are present.
    pub fn from_capabilities(capabilities: &CapabilityMap) -> Self {
        if capabilities.contains(CAPABILITY_COLOR) {
            DeviceClass::ColorLight
        } else if capabilities.contains(CAPABILITY_BRIGHTNESS) {
            DeviceClass::DimmableLight
        } else {
            DeviceClass::Basic
        }
    }
}

/// A bulb or group paired with a bridge.
///
/// Groups are reported like single devices with their group identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndDevice {
    pub device_id: String,
    pub friendly_name: String,
    pub capabilities: CapabilityMap,
    pub device_class: DeviceClass,
    pub is_group: bool,
}

impl EndDevice {
    fn new(device_id: String, friendly_name: String, capabilities: CapabilityMap, is_group: bool) -> Self {
        let device_class = DeviceClass::from_capabilities(&capabilities);
        Self {
            device_id,
            friendly_name,
            capabilities,
            device_class,
            is_group,
        }
    }
}

/// True when the identifier addresses a group rather than a single device.
pub fn is_group_id(device_id: &str) -> bool {
    device_id.len() == GROUP_ID_LEN
}

/// Parse the `DeviceLists` document returned by `GetEndDevices`.
///
/// Devices come first, followed by groups, each in document order.
pub fn parse_device_lists(xml: &str) -> Result<Vec<EndDevice>> {
    let root = parse_document(xml, "DeviceLists")?;
    let mut devices = Vec::new();

    for list in child_elements(&root).filter(|e| e.name == "DeviceList") {
        if let Some(infos) = list.get_child("DeviceInfos") {
            for info in child_elements(infos).filter(|e| e.name == "DeviceInfo") {
                devices.push(EndDevice::new(
                    required_text(info, "DeviceID")?,
                    text(info, "FriendlyName").unwrap_or_default(),
                    CapabilityMap::from_csv(
                        &text(info, "CapabilityIDs").unwrap_or_default(),
                        &text(info, "CurrentState").unwrap_or_default(),
                    ),
                    false,
                ));
            }
        }

        if let Some(groups) = list.get_child("GroupInfos") {
            for group in child_elements(groups).filter(|e| e.name == "GroupInfo") {
                devices.push(EndDevice::new(
                    required_text(group, "GroupID")?,
                    text(group, "GroupName").unwrap_or_default(),
                    CapabilityMap::from_csv(
                        &text(group, "GroupCapabilityIDs").unwrap_or_default(),
                        &text(group, "GroupCapabilityValues").unwrap_or_default(),
                    ),
                    true,
                ));
            }
        }
    }

    Ok(devices)
}

/// Parse the `DeviceStatusList` document returned by `GetDeviceStatus`.
///
/// Only the first status entry is used.
pub fn parse_device_status(xml: &str) -> Result<CapabilityMap> {
    let root = parse_document(xml, "DeviceStatusList")?;
    let status = root
        .get_child("DeviceStatus")
        .ok_or_else(|| ApiError::protocol("DeviceStatusList has no DeviceStatus"))?;

    Ok(CapabilityMap::from_csv(
        &text(status, "CapabilityID").unwrap_or_default(),
        &text(status, "CapabilityValue").unwrap_or_default(),
    ))
}

/// Build the `DeviceStatus` document sent with `SetDeviceStatus`.
pub fn render_device_status(device_id: &str, capability_id: &str, value: &str) -> String {
    let group = if is_group_id(device_id) { "YES" } else { "NO" };
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><DeviceStatus><IsGroupAction>{group}</IsGroupAction><DeviceID>{}</DeviceID><CapabilityID>{}</CapabilityID><CapabilityValue>{}</CapabilityValue></DeviceStatus>",
        escape(device_id),
        escape(capability_id),
        escape(value)
    )
}

fn parse_document(xml: &str, expected_root: &str) -> Result<Element> {
    let root = Element::parse(xml.as_bytes())
        .map_err(|e| ApiError::protocol(format!("invalid {expected_root} document: {e}")))?;
    if root.name != expected_root {
        return Err(ApiError::protocol(format!(
            "expected {expected_root}, found {}",
            root.name
        )));
    }
    Ok(root)
}

fn text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.into_owned())
}

fn required_text(element: &Element, name: &str) -> Result<String> {
    text(element, name).ok_or_else(|| ApiError::protocol(format!("{} is missing {name}", element.name)))
}
