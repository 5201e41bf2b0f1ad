use super::types::{Message, Role};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::trace;

/// Change notification emitted after every append.
///
/// The rendering surface treats each event as a "scroll to latest" hint.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Appended { index: usize, message: Message },
}

/// Append-only conversation history.
///
/// Clones share the same history. Only the controller thread appends; other
/// threads take snapshots through [`ConversationStore::history`].
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Arc<RwLock<Vec<Message>>>,
    subscribers: Arc<Mutex<Vec<Sender<StoreEvent>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a store seeded with one bot-authored greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let store = Self::new();
        store.messages.write().push(Message::bot(greeting));
        store
    }

    pub fn append(&self, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(role, content);
        let index = {
            let mut messages = self.messages.write();
            messages.push(message.clone());
            messages.len() - 1
        };
        trace!(index, role = %message.role(), "message appended");

        let event = StoreEvent::Appended {
            index,
            message: message.clone(),
        };
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());

        message
    }

    pub fn history(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.read().last().cloned()
    }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
