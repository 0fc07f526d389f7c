//! High-level WeMo API for device control
//!
//! This crate provides typed access to Belkin WeMo endpoints. It uses the
//! private `soap-client` crate for the wire protocol and adds:
//!
//! - endpoint and service descriptors parsed from `setup.xml`
//! - a [`DeviceClient`] with the control actions of switches, dimmers,
//!   bridges, Insight plugs and attribute-based devices
//! - decoding of pushed event notifications into [`DeviceEvent`]s
//! - the capability and color encodings used by bridge sub-devices
//!
//! ```rust,ignore
//! use wemo_api::{DeviceClient, EndpointDescriptor};
//!
//! let xml = soap_client::SoapClient::new().fetch("http://192.168.1.20:49153/setup.xml")?;
//! let descriptor = EndpointDescriptor::from_setup_xml(&xml, "192.168.1.20", 49153)?;
//! let client = DeviceClient::new(descriptor);
//!
//! for device in client.get_end_devices()? {
//!     println!("{} ({:?})", device.friendly_name, device.device_class);
//! }
//! ```

pub mod bridge;
pub mod capability;
pub mod client;
pub mod color;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod service;

pub use bridge::{DeviceClass, EndDevice};
pub use capability::CapabilityMap;
pub use client::{DeviceClient, EndpointAddress};
pub use color::rgb2xy;
pub use descriptor::EndpointDescriptor;
pub use error::{ApiError, Result};
pub use events::{decode_notification, Attribute, DeviceEvent, InsightParams, PropertyKind};
pub use service::{DeviceType, EventChannel, ServiceDescriptor};
