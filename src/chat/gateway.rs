use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{bus::EventBus, events::ChatEvent};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Identifies a previously-sent message so it can be edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub id: String,
    pub channel_id: String,
}

impl MessageHandle {
    fn new(channel_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel_id: channel_id.to_string(),
        }
    }
}

/// The messaging-platform boundary. The phase engine treats every failure
/// from these methods as non-fatal: a dropped announcement never stalls a
/// match.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel_id: &str, content: &str)
        -> Result<MessageHandle, ChatError>;

    async fn edit_message(&self, handle: &MessageHandle, content: &str) -> Result<(), ChatError>;

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), ChatError>;

    async fn send_direct(&self, player_id: &str, content: &str) -> Result<(), ChatError>;
}

/// Gateway that broadcasts chat as [`ChatEvent`]s over the [`EventBus`].
/// Public traffic is keyed by channel id, direct messages by
/// `dm:<player_id>`.
pub struct EventBusGateway {
    bus: EventBus,
}

impl EventBusGateway {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn dm_key(player_id: &str) -> String {
        format!("dm:{player_id}")
    }
}

#[async_trait]
impl ChatGateway for EventBusGateway {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageHandle, ChatError> {
        let handle = MessageHandle::new(channel_id);
        self.bus
            .emit(
                channel_id,
                ChatEvent::MessagePosted {
                    handle: handle.id.clone(),
                    channel_id: channel_id.to_string(),
                    content: content.to_string(),
                },
            )
            .await;
        Ok(handle)
    }

    async fn edit_message(&self, handle: &MessageHandle, content: &str) -> Result<(), ChatError> {
        self.bus
            .emit(
                &handle.channel_id,
                ChatEvent::MessageEdited {
                    handle: handle.id.clone(),
                    content: content.to_string(),
                },
            )
            .await;
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), ChatError> {
        self.bus
            .emit(
                &handle.channel_id,
                ChatEvent::MessageDeleted {
                    handle: handle.id.clone(),
                },
            )
            .await;
        Ok(())
    }

    async fn send_direct(&self, player_id: &str, content: &str) -> Result<(), ChatError> {
        self.bus
            .emit(
                &Self::dm_key(player_id),
                ChatEvent::DirectMessage {
                    player_id: player_id.to_string(),
                    content: content.to_string(),
                },
            )
            .await;
        Ok(())
    }
}

/// Gateway that records everything it is asked to deliver. For tests that
/// assert on announcements and DMs.
#[derive(Default)]
pub struct RecordingGateway {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().await.clone()
    }

    /// Contents of every posted channel message, in order.
    pub async fn posted(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ChatEvent::MessagePosted { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    /// Contents of every direct message sent to `player_id`, in order.
    pub async fn direct_to(&self, player_id: &str) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ChatEvent::DirectMessage {
                    player_id: to,
                    content,
                } if to == player_id => Some(content.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<MessageHandle, ChatError> {
        let handle = MessageHandle::new(channel_id);
        self.events.lock().await.push(ChatEvent::MessagePosted {
            handle: handle.id.clone(),
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        });
        Ok(handle)
    }

    async fn edit_message(&self, handle: &MessageHandle, content: &str) -> Result<(), ChatError> {
        self.events.lock().await.push(ChatEvent::MessageEdited {
            handle: handle.id.clone(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), ChatError> {
        self.events.lock().await.push(ChatEvent::MessageDeleted {
            handle: handle.id.clone(),
        });
        Ok(())
    }

    async fn send_direct(&self, player_id: &str, content: &str) -> Result<(), ChatError> {
        self.events.lock().await.push(ChatEvent::DirectMessage {
            player_id: player_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Gateway whose every delivery fails. For tests proving that delivery
/// failures never stall the phase loop.
pub struct FailingGateway;

#[async_trait]
impl ChatGateway for FailingGateway {
    async fn send_message(
        &self,
        _channel_id: &str,
        _content: &str,
    ) -> Result<MessageHandle, ChatError> {
        Err(ChatError::Delivery("gateway offline".to_string()))
    }

    async fn edit_message(&self, _handle: &MessageHandle, _content: &str) -> Result<(), ChatError> {
        Err(ChatError::Delivery("gateway offline".to_string()))
    }

    async fn delete_message(&self, _handle: &MessageHandle) -> Result<(), ChatError> {
        Err(ChatError::Delivery("gateway offline".to_string()))
    }

    async fn send_direct(&self, _player_id: &str, _content: &str) -> Result<(), ChatError> {
        Err(ChatError::Delivery("gateway offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_gateway_broadcasts_posts_and_dms() {
        let bus = EventBus::new();
        let gateway = EventBusGateway::new(bus.clone());

        let mut channel_rx = bus.subscribe("village").await;
        let mut dm_rx = bus.subscribe(&EventBusGateway::dm_key("alice")).await;

        let handle = gateway.send_message("village", "Night falls.").await.unwrap();
        gateway.edit_message(&handle, "Night falls!").await.unwrap();
        gateway.send_direct("alice", "You are the Doctor").await.unwrap();

        assert!(matches!(
            channel_rx.recv().await.unwrap(),
            ChatEvent::MessagePosted { .. }
        ));
        assert!(matches!(
            channel_rx.recv().await.unwrap(),
            ChatEvent::MessageEdited { .. }
        ));
        assert!(matches!(
            dm_rx.recv().await.unwrap(),
            ChatEvent::DirectMessage { .. }
        ));
    }

    #[tokio::test]
    async fn recording_gateway_keeps_order() {
        let gateway = RecordingGateway::new();
        gateway.send_message("c", "first").await.unwrap();
        gateway.send_message("c", "second").await.unwrap();

        assert_eq!(gateway.posted().await, vec!["first", "second"]);
    }
}
