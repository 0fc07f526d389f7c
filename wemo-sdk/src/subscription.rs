//! Per-service event subscription engine.
//!
//! One engine exists per (endpoint, service type). It owns a single driver
//! task that performs the SUBSCRIBE, sleeps until the renewal deadline,
//! renews, and on failure backs off and starts over. Only that task mutates
//! the subscription state, so transitions are serialized without further
//! coordination.
//!
//! ```text
//! Idle --ensure--> Pending --200+SID--> Active --renew ok--> Active
//!                     |                   |
//!                     |                   +--renew rejected--> Idle --> Pending
//!                     +--rejected / transport error--> Failed --backoff--> Pending
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use soap_client::{NetworkErrorKind, SoapError, SubscriptionResponse};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use wemo_api::EndpointAddress;

use crate::config::SdkConfig;
use crate::handle::EndpointEvent;
use crate::transport::EventTransport;

/// State of one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// No attempt in progress
    Idle,
    /// SUBSCRIBE in flight
    Pending,
    /// Subscribed; renewal is due at `renew_at`
    Active { sid: String, renew_at: Instant },
    /// Last attempt failed; a retry is scheduled
    Failed(String),
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active { .. })
    }

    pub fn sid(&self) -> Option<&str> {
        match self {
            SubscriptionStatus::Active { sid, .. } => Some(sid),
            _ => None,
        }
    }
}

/// Reported on the endpoint's event stream when subscription maintenance
/// hits a transport failure. A retry is always scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFailure {
    pub endpoint_id: String,
    pub service_type: String,
    pub kind: NetworkErrorKind,
    pub message: String,
}

/// Timing and port settings shared by all engines.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub timeout_seconds: u32,
    pub renewal_margin: Duration,
    pub retry_backoff: Duration,
    pub candidate_ports: (u16, u16),
}

impl From<&SdkConfig> for SubscriptionSettings {
    fn from(config: &SdkConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds(),
            renewal_margin: config.renewal_margin,
            retry_backoff: config.retry_backoff,
            candidate_ports: config.candidate_ports,
        }
    }
}

impl SubscriptionSettings {
    /// Delay until renewal for a granted timeout.
    ///
    /// Renewal happens `renewal_margin` before expiry. When the grant does not
    /// exceed the margin, halfway through the grant instead.
    pub fn renewal_delay(&self, granted_seconds: u32) -> Duration {
        let granted = Duration::from_secs(u64::from(granted_seconds));
        let delay = if granted > self.renewal_margin {
            granted - self.renewal_margin
        } else {
            granted / 2
        };
        delay.max(Duration::from_secs(1))
    }
}

/// Everything engines of one endpoint share.
pub(crate) struct EngineContext {
    pub endpoint_id: String,
    pub callback_url: String,
    pub address: Arc<EndpointAddress>,
    pub transport: Arc<dyn EventTransport>,
    pub settings: SubscriptionSettings,
    pub events: broadcast::Sender<EndpointEvent>,
    pub runtime: Handle,
}

/// Subscription engine for one service of one endpoint.
pub struct SubscriptionEngine {
    service_type: String,
    event_path: String,
    ctx: Arc<EngineContext>,
    status: Arc<Mutex<SubscriptionStatus>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionEngine {
    pub(crate) fn new(
        service_type: impl Into<String>,
        event_path: impl Into<String>,
        ctx: Arc<EngineContext>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            event_path: event_path.into(),
            ctx,
            status: Arc::new(Mutex::new(SubscriptionStatus::Idle)),
            driver: Mutex::new(None),
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status.lock().clone()
    }

    /// Make sure a subscription exists or is being established.
    ///
    /// No-op while `Pending` or `Active`, and while `Failed` with a retry
    /// already scheduled; that retry is the next SUBSCRIBE. From `Idle` a
    /// fresh SUBSCRIBE is started right away.
    pub fn ensure_subscribed(&self) {
        let mut driver = self.driver.lock();
        {
            let mut status = self.status.lock();
            let retry_scheduled = driver.as_ref().is_some_and(|d| !d.is_finished());
            match *status {
                SubscriptionStatus::Pending | SubscriptionStatus::Active { .. } => return,
                SubscriptionStatus::Failed(_) if retry_scheduled => return,
                _ => {}
            }
            *status = SubscriptionStatus::Pending;
        }

        if let Some(previous) = driver.take() {
            previous.abort();
        }

        debug!(
            endpoint = %self.ctx.endpoint_id,
            service_type = %self.service_type,
            "Starting subscription driver"
        );

        let driver_state = Driver {
            service_type: self.service_type.clone(),
            event_path: self.event_path.clone(),
            ctx: self.ctx.clone(),
            status: self.status.clone(),
        };
        *driver = Some(self.ctx.runtime.spawn(driver_state.run()));
    }

    /// Cancel timers and in-flight work.
    ///
    /// Returns the SID of an active subscription so the caller can release it
    /// on the device.
    pub(crate) fn stop(&self) -> Option<String> {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        let previous = std::mem::replace(&mut *self.status.lock(), SubscriptionStatus::Idle);
        match previous {
            SubscriptionStatus::Active { sid, .. } => Some(sid),
            _ => None,
        }
    }

    /// Cancel the driver and send a best-effort UNSUBSCRIBE.
    pub(crate) fn shutdown(&self) {
        let Some(sid) = self.stop() else {
            return;
        };

        let ctx = self.ctx.clone();
        let event_path = self.event_path.clone();
        self.ctx.runtime.spawn(async move {
            let (host, port) = ctx.address.get();
            match ctx.transport.unsubscribe(&host, port, &event_path, &sid).await {
                Ok(()) => debug!(endpoint = %ctx.endpoint_id, %sid, "Unsubscribed"),
                Err(e) => debug!(endpoint = %ctx.endpoint_id, %sid, error = %e, "Unsubscribe failed"),
            }
        });
    }
}

impl Drop for SubscriptionEngine {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

/// State owned by the driver task.
struct Driver {
    service_type: String,
    event_path: String,
    ctx: Arc<EngineContext>,
    status: Arc<Mutex<SubscriptionStatus>>,
}

impl Driver {
    async fn run(self) {
        let mut sid: Option<String> = None;

        loop {
            let (host, port) = self.ctx.address.get();
            let timeout = self.ctx.settings.timeout_seconds;

            let outcome = match &sid {
                Some(current) => {
                    debug!(
                        endpoint = %self.ctx.endpoint_id,
                        service_type = %self.service_type,
                        sid = %current,
                        "Renewing subscription"
                    );
                    self.ctx
                        .transport
                        .renew(&host, port, &self.event_path, current, timeout)
                        .await
                }
                None => {
                    self.set_status(SubscriptionStatus::Pending);
                    debug!(
                        endpoint = %self.ctx.endpoint_id,
                        service_type = %self.service_type,
                        port,
                        "Subscribing"
                    );
                    self.ctx
                        .transport
                        .subscribe(&host, port, &self.event_path, &self.ctx.callback_url, timeout)
                        .await
                }
            };

            let wait = match outcome {
                Ok(response) => {
                    let delay = self.on_success(response, &mut sid);
                    Some(delay)
                }
                Err(SoapError::Network { kind, message }) => {
                    sid = None;
                    self.on_transport_failure(kind, message);
                    Some(self.ctx.settings.retry_backoff)
                }
                Err(e) if sid.is_some() => {
                    warn!(
                        endpoint = %self.ctx.endpoint_id,
                        service_type = %self.service_type,
                        error = %e,
                        "Renewal rejected, subscribing again"
                    );
                    sid = None;
                    self.set_status(SubscriptionStatus::Idle);
                    None
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.ctx.endpoint_id,
                        service_type = %self.service_type,
                        error = %e,
                        "Subscription rejected, retrying"
                    );
                    self.set_status(SubscriptionStatus::Failed(e.to_string()));
                    Some(self.ctx.settings.retry_backoff)
                }
            };

            if let Some(wait) = wait {
                sleep(wait).await;
            }
        }
    }

    fn on_success(&self, response: SubscriptionResponse, sid: &mut Option<String>) -> Duration {
        let delay = self.ctx.settings.renewal_delay(response.timeout_seconds);
        if sid.is_none() {
            info!(
                endpoint = %self.ctx.endpoint_id,
                service_type = %self.service_type,
                sid = %response.sid,
                timeout = response.timeout_seconds,
                "Subscribed"
            );
        }

        self.set_status(SubscriptionStatus::Active {
            sid: response.sid.clone(),
            renew_at: Instant::now() + delay,
        });
        self.ctx.address.mark_reachable();
        *sid = Some(response.sid);
        delay
    }

    fn on_transport_failure(&self, kind: NetworkErrorKind, message: String) {
        warn!(
            endpoint = %self.ctx.endpoint_id,
            service_type = %self.service_type,
            %kind,
            %message,
            "Subscription transport failure"
        );

        if kind == NetworkErrorKind::ConnectionRefused {
            self.ctx.address.toggle_port(self.ctx.settings.candidate_ports);
        }

        self.set_status(SubscriptionStatus::Failed(message.clone()));
        self.ctx.address.mark_failed();

        let _ = self.ctx.events.send(EndpointEvent::Error(SubscriptionFailure {
            endpoint_id: self.ctx.endpoint_id.clone(),
            service_type: self.service_type.clone(),
            kind,
            message,
        }));
    }

    fn set_status(&self, status: SubscriptionStatus) {
        *self.status.lock() = status;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Subscribe { port: u16, callback_url: String },
        Renew { port: u16, sid: String },
        Unsubscribe { sid: String },
    }

    /// Transport that replays scripted outcomes and records every call.
    ///
    /// Subscribe and renew share one script, consumed in call order. Once it
    /// runs dry every request succeeds with a fresh SID and a 300 s grant.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<SubscriptionResponse, SoapError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<SubscriptionResponse, SoapError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn next(&self) -> Result<SubscriptionResponse, SoapError> {
            let count = self.calls.lock().len();
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(granted(&format!("uuid:sid-{count}"), 300)))
        }
    }

    pub fn granted(sid: &str, timeout_seconds: u32) -> SubscriptionResponse {
        SubscriptionResponse {
            sid: sid.to_string(),
            timeout_seconds,
        }
    }

    #[async_trait::async_trait]
    impl EventTransport for ScriptedTransport {
        async fn subscribe(
            &self,
            _host: &str,
            port: u16,
            _event_path: &str,
            callback_url: &str,
            _timeout_seconds: u32,
        ) -> Result<SubscriptionResponse, SoapError> {
            self.calls.lock().push(Call::Subscribe {
                port,
                callback_url: callback_url.to_string(),
            });
            self.next()
        }

        async fn renew(
            &self,
            _host: &str,
            port: u16,
            _event_path: &str,
            sid: &str,
            _timeout_seconds: u32,
        ) -> Result<SubscriptionResponse, SoapError> {
            self.calls.lock().push(Call::Renew {
                port,
                sid: sid.to_string(),
            });
            self.next()
        }

        async fn unsubscribe(
            &self,
            _host: &str,
            _port: u16,
            _event_path: &str,
            sid: &str,
        ) -> Result<(), SoapError> {
            self.calls.lock().push(Call::Unsubscribe {
                sid: sid.to_string(),
            });
            Ok(())
        }
    }
}
