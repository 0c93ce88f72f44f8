//! Simple stateless pub-sub plumbing.
//!
//! Handlers receive the event value and nothing else; they have no access to engine internals. Handlers may be
//! async and run on their own tasks, so a slow consumer never stalls the pipeline that published the event.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Owns the receiving end of an event channel and fans each event out to the registered handler on a fresh task.
pub struct EventDispatcher<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventDispatcher<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventPublisher<E> {
        EventPublisher::new(self.sender.clone())
    }

    /// Runs until every publisher has been dropped, then drains and returns.
    pub async fn start(mut self) {
        debug!("📬️ Event dispatcher started");
        // Drop our own sender so the loop ends once the last external publisher goes away.
        drop(self.sender);
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                (handler)(ev).await;
                trace!("📬️ Event handled");
            });
        }
        debug!("📬️ Event dispatcher shut down");
    }
}

#[derive(Clone)]
pub struct EventPublisher<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventPublisher<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to publish event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn events_reach_the_handler() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let tally = total.clone();
        let handler = Arc::new(move |v: u64| {
            let total = total.clone();
            Box::pin(async move {
                total.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let dispatcher = EventDispatcher::new(4, handler);
        let publisher = dispatcher.subscribe();
        tokio::spawn(async move {
            for v in 1..=10u64 {
                publisher.publish(v).await;
            }
        });
        dispatcher.start().await;
        // Handlers run on spawned tasks; give them a beat to finish.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(tally.load(Ordering::SeqCst), 55);
    }
}
