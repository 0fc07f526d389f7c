//! WemoSdk - main entry point
//!
//! Owns the callback server and the endpoint registry, and turns discovery
//! announcements into endpoint handles.

use std::sync::Arc;

use callback_server::{CallbackServer, EventRouter};
use soap_client::SoapClient;
use tokio::runtime::Handle;
use tracing::{debug, info};
use url::Url;
use wemo_api::service::BASIC_EVENT;
use wemo_api::{ApiError, EndpointDescriptor};

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::handle::{EndpointHandle, HandleParts};
use crate::registry::Registry;
use crate::subscription::SubscriptionSettings;
use crate::transport::EventTransport;

/// Controller for a set of WeMo endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use wemo_sdk::{EventChannel, SdkConfig, WemoSdk};
///
/// #[tokio::main]
/// async fn main() -> Result<(), wemo_sdk::SdkError> {
///     let sdk = WemoSdk::new(SdkConfig::default()).await?;
///
///     let descriptor = sdk.load("http://192.168.1.20:49153/setup.xml").await?;
///     let handle = sdk.client(descriptor);
///
///     let mut events = handle.events();
///     handle.ensure_subscribed(EventChannel::BinaryState)?;
///
///     while let Ok(event) = events.recv().await {
///         println!("{}: {:?}", handle.descriptor().friendly_name, event);
///     }
///     Ok(())
/// }
/// ```
pub struct WemoSdk {
    registry: Arc<Registry>,
    server: CallbackServer,
    soap: SoapClient,
}

impl WemoSdk {
    /// Start the callback server and an empty registry.
    ///
    /// Must be called from within a tokio runtime; subscription timers run
    /// on that runtime.
    pub async fn new(config: SdkConfig) -> Result<Self> {
        let soap = SoapClient::with_timeouts(config.rpc_connect_timeout, config.rpc_read_timeout);
        Self::start(config, soap.clone(), Arc::new(soap)).await
    }

    /// Like [`new`](Self::new), with a custom subscription transport
    pub async fn with_transport(config: SdkConfig, transport: Arc<dyn EventTransport>) -> Result<Self> {
        let soap = SoapClient::with_timeouts(config.rpc_connect_timeout, config.rpc_read_timeout);
        Self::start(config, soap, transport).await
    }

    /// `soap` carries RPCs and descriptor fetches; `transport` carries
    /// subscriptions. [`new`](Self::new) passes the same client for both.
    async fn start(
        config: SdkConfig,
        soap: SoapClient,
        transport: Arc<dyn EventTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;

        let registry = Arc::new(Registry::new(HandleParts {
            soap: soap.clone(),
            transport,
            settings: SubscriptionSettings::from(&config),
            event_buffer_size: config.event_buffer_size,
            runtime,
        }));

        let server = CallbackServer::new(
            config.callback_port_range,
            config.callback_host,
            EventRouter::new(registry.clone()),
        )
        .await?;

        info!(callback_url = %server.base_url(), "WeMo SDK started");

        Ok(Self {
            registry,
            server,
            soap,
        })
    }

    /// Base URL devices call back to
    pub fn callback_url(&self) -> &str {
        self.server.base_url()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fetch and parse the description document at `location`.
    ///
    /// The descriptor takes its host and port from the location and its
    /// callback base from this controller.
    pub async fn load(&self, location: &str) -> Result<EndpointDescriptor> {
        let url = Url::parse(location).map_err(|e| invalid_location(location, e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| invalid_location(location, "missing host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid_location(location, "missing port".to_string()))?;

        debug!(%location, "Loading endpoint description");

        let soap = self.soap.clone();
        let target = location.to_string();
        let xml = tokio::task::spawn_blocking(move || soap.fetch(&target))
            .await
            .map_err(|e| SdkError::Runtime(e.to_string()))?
            .map_err(ApiError::from)?;

        let descriptor = EndpointDescriptor::from_setup_xml(&xml, host, port)?
            .with_callback_url(self.callback_url());
        Ok(descriptor)
    }

    /// Handle for a descriptor, creating one unless a healthy one exists.
    ///
    /// A descriptor without a callback base gets this controller's.
    pub fn client(&self, descriptor: EndpointDescriptor) -> Arc<EndpointHandle> {
        self.registry.get_or_create(self.with_callback(descriptor))
    }

    /// React to a discovery announcement.
    ///
    /// Only announcements for the basic event service are considered, since
    /// every WeMo device answers for it. Returns the handle when a new one was
    /// created; re-announcements of a healthy endpoint return `None`.
    pub async fn handle_announcement(
        &self,
        search_target: &str,
        location: &str,
    ) -> Result<Option<Arc<EndpointHandle>>> {
        if search_target != BASIC_EVENT {
            return Ok(None);
        }

        let descriptor = self.load(location).await?;
        let (handle, created) = self.registry.get_or_insert(descriptor);
        if created {
            info!(
                endpoint = %handle.id(),
                name = %handle.descriptor().friendly_name,
                "Found endpoint"
            );
            Ok(Some(handle))
        } else {
            debug!(endpoint = %handle.id(), "Ignoring re-announcement");
            Ok(None)
        }
    }

    /// Shut down every handle and stop the callback server
    pub async fn shutdown(self) -> Result<()> {
        self.registry.clear();
        self.server.shutdown().await?;
        Ok(())
    }

    fn with_callback(&self, descriptor: EndpointDescriptor) -> EndpointDescriptor {
        if descriptor.callback_url.is_some() {
            descriptor
        } else {
            descriptor.with_callback_url(self.callback_url())
        }
    }
}

fn invalid_location(location: &str, reason: String) -> SdkError {
    SdkError::InvalidLocation {
        location: location.to_string(),
        reason,
    }
}
