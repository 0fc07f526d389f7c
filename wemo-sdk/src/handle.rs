//! Endpoint handles: one per physical device, owning its subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use soap_client::SoapClient;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wemo_api::{decode_notification, DeviceClient, DeviceEvent, EndpointAddress, EndpointDescriptor, EventChannel};

use crate::error::{Result, SdkError};
use crate::subscription::{
    EngineContext, SubscriptionEngine, SubscriptionFailure, SubscriptionSettings, SubscriptionStatus,
};
use crate::transport::EventTransport;

/// Events published by an endpoint handle
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// Decoded from a push notification
    Device(DeviceEvent),
    /// Subscription maintenance failed; a retry is already scheduled
    Error(SubscriptionFailure),
}

/// Shared pieces a handle is built from.
#[derive(Clone)]
pub(crate) struct HandleParts {
    pub soap: SoapClient,
    pub transport: Arc<dyn EventTransport>,
    pub settings: SubscriptionSettings,
    pub event_buffer_size: usize,
    pub runtime: Handle,
}

/// Live view of one endpoint.
///
/// Provides the control-channel client, the event stream and the
/// subscription engines for the endpoint's services. Engines are created on
/// the first [`ensure_subscribed`](Self::ensure_subscribed) for a service and
/// stay subscribed until the handle is shut down or dropped.
pub struct EndpointHandle {
    descriptor: Arc<EndpointDescriptor>,
    client: DeviceClient,
    ctx: Arc<EngineContext>,
    engines: Mutex<HashMap<String, Arc<SubscriptionEngine>>>,
    shut_down: AtomicBool,
}

impl EndpointHandle {
    pub(crate) fn new(descriptor: EndpointDescriptor, parts: HandleParts) -> Self {
        let descriptor = Arc::new(descriptor);
        let address = Arc::new(EndpointAddress::new(descriptor.host.clone(), descriptor.port));
        let (events, _) = broadcast::channel(parts.event_buffer_size);

        let callback_url = descriptor
            .callback_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), descriptor.udn))
            .unwrap_or_default();

        let ctx = Arc::new(EngineContext {
            endpoint_id: descriptor.udn.clone(),
            callback_url,
            address: address.clone(),
            transport: parts.transport,
            settings: parts.settings,
            events,
            runtime: parts.runtime,
        });

        Self {
            client: DeviceClient::with_parts(descriptor.clone(), address, parts.soap),
            descriptor,
            ctx,
            engines: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Endpoint identifier (UDN)
    pub fn id(&self) -> &str {
        &self.descriptor.udn
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// Control-channel client; follows port changes made by recovery
    pub fn device(&self) -> &DeviceClient {
        &self.client
    }

    /// Full callback URL given to devices, including the identifier
    pub fn callback_url(&self) -> &str {
        &self.ctx.callback_url
    }

    /// Receive decoded events and subscription failures
    pub fn events(&self) -> broadcast::Receiver<EndpointEvent> {
        self.ctx.events.subscribe()
    }

    /// Ask for `channel` to be kept subscribed.
    ///
    /// Idempotent: channels sharing a service share one subscription, and a
    /// pending or active subscription is left alone.
    ///
    /// # Errors
    /// * [`SdkError::Api`] with `UnsupportedService` when the endpoint lacks
    ///   the channel's service
    /// * [`SdkError::NoCallbackUrl`] when the descriptor has no callback base
    pub fn ensure_subscribed(&self, channel: EventChannel) -> Result<()> {
        let service = self.descriptor.require_service(channel.service_type())?;
        if self.ctx.callback_url.is_empty() {
            return Err(SdkError::NoCallbackUrl(self.descriptor.udn.clone()));
        }
        if self.shut_down.load(Ordering::SeqCst) {
            warn!(endpoint = %self.id(), %channel, "Ignoring subscription request on a shut down handle");
            return Ok(());
        }

        let engine = self
            .engines
            .lock()
            .entry(service.service_type.clone())
            .or_insert_with(|| {
                Arc::new(SubscriptionEngine::new(
                    service.service_type.clone(),
                    service.event_path.clone(),
                    self.ctx.clone(),
                ))
            })
            .clone();

        debug!(endpoint = %self.id(), %channel, "Ensuring subscription");
        engine.ensure_subscribed();
        Ok(())
    }

    /// Status of the subscription feeding `channel`; `Idle` if never requested
    pub fn subscription_status(&self, channel: EventChannel) -> SubscriptionStatus {
        self.engines
            .lock()
            .get(channel.service_type())
            .map(|engine| engine.status())
            .unwrap_or(SubscriptionStatus::Idle)
    }

    /// True while the latest RPC or subscription request to the endpoint
    /// failed at the transport level
    pub fn is_failed(&self) -> bool {
        self.ctx.address.is_failed()
    }

    /// Decode a pushed notification and publish its events in order.
    pub fn handle_notification(&self, body: &str) -> Vec<DeviceEvent> {
        let events = match decode_notification(body) {
            Ok(events) => events,
            Err(e) => {
                warn!(endpoint = %self.id(), error = %e, "Discarding undecodable notification");
                return Vec::new();
            }
        };

        for event in &events {
            let _ = self.ctx.events.send(EndpointEvent::Device(event.clone()));
        }
        events
    }

    /// Cancel every subscription timer and release active subscriptions.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(endpoint = %self.id(), "Shutting down endpoint handle");
        for engine in self.engines.lock().values() {
            engine.shutdown();
        }
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for EndpointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("id", &self.descriptor.udn)
            .field("failed", &self.is_failed())
            .finish()
    }
}
