use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::model::NodeEvent;

/// Fan-out of node events to every live subscriber.
///
/// Subscribers whose receiver was dropped are pruned on the next broadcast.
#[derive(Clone, Default)]
pub struct NodeEventBus {
    subscribers: Arc<Mutex<Vec<UnboundedSender<NodeEvent>>>>,
}

impl NodeEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<NodeEvent> {
        let (tx, rx) = unbounded_channel::<NodeEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
        }
        rx
    }

    pub fn broadcast(&self, event: NodeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
