use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for capacity-change notifications, keyed by excursion id.
/// Admin dashboards subscribe in-process to refresh their day views.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to an excursion's events. Creates the channel if needed.
    pub fn subscribe(&self, excursion_id: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(excursion_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, excursion_id: &str, event: &Event) {
        if let Some(sender) = self.channels.get(excursion_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when an excursion is deregistered).
    pub fn remove(&self, excursion_id: &str) {
        self.channels.remove(excursion_id);
    }
}
