//! Process-wide publish/subscribe channel for package notifications.

use shared::protocol::{BusMessage, PackageChanged, PackageHasUpdate};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<BusMessage>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes to every current subscriber. Having none is not an error.
    pub fn publish(&self, message: BusMessage) {
        match self.tx.send(message) {
            Ok(receivers) => debug!(receivers, "published bus message"),
            Err(_) => debug!("published bus message with no subscribers"),
        }
    }

    pub fn publish_changed(&self, changed: PackageChanged) {
        self.publish(BusMessage::PackageChanged(changed));
    }

    pub fn publish_has_update(&self, notice: PackageHasUpdate) {
        self.publish(BusMessage::PackageHasUpdate(notice));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
