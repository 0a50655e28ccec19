// Server-initiated notifications: services push them through a `Notifier`,
// the serve loop writes them out after the response that triggered them

use herald_core::protocol::JsonRpcRequest;
use serde_json::json;
use tokio::sync::mpsc;

pub const RESOURCE_UPDATED: &str = "notifications/resources/updated";

/// Sending half handed to services
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<JsonRpcRequest>,
}

/// Receiving half drained by `McpServer::serve`
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::UnboundedReceiver<JsonRpcRequest>,
}

impl Notifier {
    pub fn channel() -> (Self, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, Outbox { rx })
    }

    /// Tell the client that the resource at `uri` changed.
    pub fn resource_updated(&self, uri: &str) {
        self.send(JsonRpcRequest::notification(
            RESOURCE_UPDATED,
            Some(json!({ "uri": uri })),
        ));
    }

    fn send(&self, notification: JsonRpcRequest) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped, no server is listening");
        }
    }
}

impl Outbox {
    /// Take every notification queued so far without waiting.
    pub fn drain(&mut self) -> Vec<JsonRpcRequest> {
        let mut pending = Vec::new();
        while let Ok(notification) = self.rx.try_recv() {
            pending.push(notification);
        }
        pending
    }
}
