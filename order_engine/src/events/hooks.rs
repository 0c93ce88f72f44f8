use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    channel::{EventDispatcher, EventPublisher, Handler},
    OrderCreatedEvent,
    OrderDeletedEvent,
    StockAdjustedEvent,
};

/// The set of publishers handed to engine APIs. Each API publishes into every registered subscriber list.
#[derive(Default, Clone)]
pub struct EventPublishers {
    pub order_created: Vec<EventPublisher<OrderCreatedEvent>>,
    pub order_deleted: Vec<EventPublisher<OrderDeletedEvent>>,
    pub stock_adjusted: Vec<EventPublisher<StockAdjustedEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventDispatcher<OrderCreatedEvent>>,
    pub on_order_deleted: Option<EventDispatcher<OrderDeletedEvent>>,
    pub on_stock_adjusted: Option<EventDispatcher<StockAdjustedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventDispatcher::new(buffer_size, f)),
            on_order_deleted: hooks.on_order_deleted.map(|f| EventDispatcher::new(buffer_size, f)),
            on_stock_adjusted: hooks.on_stock_adjusted.map(|f| EventDispatcher::new(buffer_size, f)),
        }
    }

    pub fn publishers(&self) -> EventPublishers {
        let mut result = EventPublishers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_deleted {
            result.order_deleted.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_stock_adjusted {
            result.stock_adjusted.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start());
        }
        if let Some(handler) = self.on_order_deleted {
            tokio::spawn(handler.start());
        }
        if let Some(handler) = self.on_stock_adjusted {
            tokio::spawn(handler.start());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_deleted: Option<Handler<OrderDeletedEvent>>,
    pub on_stock_adjusted: Option<Handler<StockAdjustedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_deleted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDeletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_deleted = Some(Arc::new(f));
        self
    }

    pub fn on_stock_adjusted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(StockAdjustedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_stock_adjusted = Some(Arc::new(f));
        self
    }
}
