//! Event hooks emitted by the order sync engine.
//!
//! A simple stateless pub-sub layer: components subscribe to engine events (order created, order deleted, stock
//! adjusted) and react asynchronously. The server uses this to feed restored stock levels into the inventory sync
//! bridge without the engine knowing the platform client exists.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventDispatcher, EventPublisher, Handler};
pub use event_types::{OrderCreatedEvent, OrderDeletedEvent, StockAdjustedEvent};
pub use hooks::{EventHandlers, EventHooks, EventPublishers};
