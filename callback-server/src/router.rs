//! Event routing for HTTP callback notifications.
//!
//! The server extracts the endpoint identifier from the request path and asks
//! the router to deliver the body. Delivery itself is delegated to a
//! [`NotificationSink`], which knows which identifiers are registered.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receiver of raw notification bodies, keyed by endpoint identifier.
pub trait NotificationSink: Send + Sync {
    /// Hand `body` to whatever is registered under `endpoint_id`.
    ///
    /// Returns `false` when nothing is registered, which the server answers
    /// with 404. Delivery must not block: it runs on the request path and
    /// determines per-endpoint ordering.
    fn deliver(&self, endpoint_id: &str, body: String) -> bool;
}

/// Routes notification bodies from the HTTP layer to a sink.
#[derive(Clone)]
pub struct EventRouter {
    sink: Arc<dyn NotificationSink>,
}

impl EventRouter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Deliver a notification; `false` means the identifier is unknown.
    pub fn route_event(&self, endpoint_id: &str, body: String) -> bool {
        trace!(%endpoint_id, bytes = body.len(), "routing notification");
        let delivered = self.sink.deliver(endpoint_id, body);
        if !delivered {
            debug!(%endpoint_id, "notification for unknown endpoint");
        }
        delivered
    }
}

/// Raw notification as received on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Identifier taken from the request path
    pub endpoint_id: String,
    /// Unparsed property set document
    pub body: String,
}

/// A sink that forwards notifications for registered identifiers to a channel.
///
/// Useful where decoding happens on another task.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use callback_server::{ChannelSink, EventRouter, NotificationPayload};
///
/// let (tx, _rx) = mpsc::unbounded_channel::<NotificationPayload>();
/// let sink = Arc::new(ChannelSink::new(tx));
/// sink.register("uuid:Socket-1_0-221517K0101769");
/// let router = EventRouter::new(sink);
/// ```
pub struct ChannelSink {
    registered: RwLock<HashSet<String>>,
    sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            registered: RwLock::new(HashSet::new()),
            sender,
        }
    }

    pub fn register(&self, endpoint_id: impl Into<String>) {
        self.registered.write().insert(endpoint_id.into());
    }

    pub fn unregister(&self, endpoint_id: &str) {
        self.registered.write().remove(endpoint_id);
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, endpoint_id: &str, body: String) -> bool {
        if !self.registered.read().contains(endpoint_id) {
            return false;
        }
        self.sender
            .send(NotificationPayload {
                endpoint_id: endpoint_id.to_string(),
                body,
            })
            .is_ok()
    }
}
