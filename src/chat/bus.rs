use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::ChatEvent;

/// Distributes outbound chat events to per-key broadcast channels. Keys are
/// channel ids for public traffic and `dm:<player_id>` for direct messages.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChatEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Emits an event under a key. An event with no subscribers is dropped;
    /// delivery is best-effort by design.
    pub async fn emit(&self, key: &str, event: ChatEvent) {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(key) {
            match sender.send(event) {
                Ok(receiver_count) => {
                    debug!(key = %key, receivers = receiver_count, "Chat event emitted");
                }
                Err(_) => {
                    debug!(key = %key, "Chat event emitted with no receivers");
                }
            }
        } else {
            debug!(key = %key, "No channel for key - creating one");
            drop(channels);

            let mut channels = self.channels.write().await;
            let sender = channels
                .entry(key.to_string())
                .or_insert_with(|| broadcast::channel(100).0)
                .clone();

            if sender.send(event).is_err() {
                debug!(key = %key, "Chat event sent to new channel with no receivers");
            }
        }
    }

    /// Subscribe to the events emitted under one key.
    pub async fn subscribe(&self, key: &str) -> broadcast::Receiver<ChatEvent> {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(key) {
            sender.subscribe()
        } else {
            drop(channels);

            let mut channels = self.channels.write().await;
            channels
                .entry(key.to_string())
                .or_insert_with(|| broadcast::channel(100).0)
                .subscribe()
        }
    }
}
