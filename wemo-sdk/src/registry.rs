//! Registry of live endpoint handles, keyed by endpoint identifier.

use std::collections::HashMap;
use std::sync::Arc;

use callback_server::NotificationSink;
use parking_lot::Mutex;
use tracing::{debug, info};
use wemo_api::EndpointDescriptor;

use crate::handle::{EndpointHandle, HandleParts};

/// Holds at most one live handle per endpoint identifier.
///
/// Also the delivery target of the callback server: notifications are
/// routed to the handle registered under the identifier in the request path.
pub struct Registry {
    handles: Mutex<HashMap<String, Arc<EndpointHandle>>>,
    parts: HandleParts,
}

impl Registry {
    pub(crate) fn new(parts: HandleParts) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            parts,
        }
    }

    /// Return the existing handle for the descriptor's identifier, or build one.
    ///
    /// A handle whose latest RPC or subscription request failed at the
    /// transport level is replaced (and shut down); a healthy one is
    /// returned unchanged.
    pub fn get_or_create(&self, descriptor: EndpointDescriptor) -> Arc<EndpointHandle> {
        self.get_or_insert(descriptor).0
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting whether a
    /// new handle was built.
    pub fn get_or_insert(&self, descriptor: EndpointDescriptor) -> (Arc<EndpointHandle>, bool) {
        let (handle, replaced) = {
            let mut handles = self.handles.lock();
            match handles.get(&descriptor.udn) {
                Some(existing) if !existing.is_failed() => return (existing.clone(), false),
                _ => {}
            }

            let udn = descriptor.udn.clone();
            let handle = Arc::new(EndpointHandle::new(descriptor, self.parts.clone()));
            let replaced = handles.insert(udn, handle.clone());
            (handle, replaced)
        };

        match replaced {
            Some(previous) => {
                info!(endpoint = %handle.id(), "Replacing failed endpoint handle");
                previous.shutdown();
            }
            None => debug!(endpoint = %handle.id(), "Registered endpoint handle"),
        }

        (handle, true)
    }

    pub fn get(&self, endpoint_id: &str) -> Option<Arc<EndpointHandle>> {
        self.handles.lock().get(endpoint_id).cloned()
    }

    /// Remove and shut down a handle
    pub fn remove(&self, endpoint_id: &str) -> Option<Arc<EndpointHandle>> {
        let removed = self.handles.lock().remove(endpoint_id);
        if let Some(handle) = &removed {
            handle.shutdown();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Shut down and forget every handle
    pub fn clear(&self) {
        let drained: Vec<_> = self.handles.lock().drain().map(|(_, handle)| handle).collect();
        for handle in drained {
            handle.shutdown();
        }
    }
}

impl NotificationSink for Registry {
    fn deliver(&self, endpoint_id: &str, body: String) -> bool {
        let Some(handle) = self.get(endpoint_id) else {
            return false;
        };
        let events = handle.handle_notification(&body);
        debug!(endpoint = %endpoint_id, events = events.len(), "Delivered notification");
        true
    }
}
