//! Run events for streaming consumers (the console renderer, a UI).
//!
//! The engine emits via [`EventBus::emit`] and consumers subscribe via
//! [`EventBus::subscribe`]. Built on [`tokio::sync::broadcast`], so every
//! subscriber sees events in emission order. A node's chunks are always
//! emitted between its `NodeEntered` and `NodeFinished` events.

use tokio::sync::broadcast;

use crate::engine::{Node, Outcome};
use crate::plan::Plan;

/// Events that flow out of a workflow run.
#[derive(Debug, Clone)]
pub enum Event {
    /// The engine started executing a node.
    NodeEntered { node: Node },
    /// A fragment of output produced by `node`.
    Chunk { node: Node, text: String },
    /// The node completed and its update was merged.
    NodeFinished { node: Node },
    /// The plan changed (created, replanned or a step completed).
    PlanUpdated { plan: Plan },
    /// The run reached `Done`.
    Finished { outcome: Outcome },
    /// The run aborted.
    Failed { error: String },
}

impl Event {
    /// True for the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Finished { .. } | Event::Failed { .. })
    }
}

/// A broadcast channel the engine emits to and consumers subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
