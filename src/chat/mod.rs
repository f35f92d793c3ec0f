// Messaging-platform boundary
//
// The core never talks to a chat platform directly. It emits plain-text
// messages through the ChatGateway trait; the event-bus implementation
// broadcasts them for whatever adapter is attached.

pub use bus::EventBus;
pub use events::ChatEvent;
pub use gateway::{
    ChatError, ChatGateway, EventBusGateway, FailingGateway, MessageHandle, RecordingGateway,
};

mod bus;
mod events;
mod gateway;
