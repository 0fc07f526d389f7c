//! # WeMo SDK
//!
//! Control Belkin WeMo devices and keep their event subscriptions alive.
//!
//! ```rust,no_run
//! use wemo_sdk::{EndpointEvent, EventChannel, SdkConfig, WemoSdk};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wemo_sdk::SdkError> {
//!     let sdk = WemoSdk::new(SdkConfig::default()).await?;
//!     let switch = sdk.client(sdk.load("http://192.168.1.20:49153/setup.xml").await?);
//!
//!     switch.device().set_binary_state(1)?;            // blocking RPC
//!     switch.ensure_subscribed(EventChannel::BinaryState)?;
//!
//!     let mut events = switch.events();
//!     while let Ok(event) = events.recv().await {
//!         if let EndpointEvent::Device(event) = event {
//!             println!("{event:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! wemo-sdk (controller, registry, handles, subscription engines)
//!     ↓                         ↓
//! wemo-api (typed RPC,     callback-server (NOTIFY listener)
//!   event decoding)
//!     ↓
//! soap-client (SOAP + GENA over HTTP)
//! ```
//!
//! Subscriptions are kept alive by one background task per endpoint and
//! service. Failures never surface as errors to callers; they appear as
//! [`EndpointEvent::Error`] on the handle's event stream and are retried.
//!
//! Once a channel has been subscribed it stays subscribed until the handle is
//! shut down, dropped, or replaced by the registry.

pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod registry;
mod sdk;
pub mod subscription;
pub mod transport;

pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use handle::{EndpointEvent, EndpointHandle};
pub use registry::Registry;
pub use sdk::WemoSdk;
pub use subscription::{SubscriptionFailure, SubscriptionStatus};
pub use transport::EventTransport;

// Re-export the types callers need alongside handles
pub use wemo_api::{
    ApiError, CapabilityMap, DeviceClass, DeviceClient, DeviceEvent, DeviceType, EndDevice,
    EndpointDescriptor, EventChannel, InsightParams,
};
