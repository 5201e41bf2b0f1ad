//! View state for the chat window
//!
//! Mirrors what the controller owns so the UI can render without locking:
//! the history (kept current from store events), the input field and the
//! listening flag. User actions are forwarded as controller commands.

use crate::controller::{ControllerHandle, ViewEvent};
use crate::messages::{Message, StoreEvent};
use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

pub struct ChatViewState {
    handle: ControllerHandle,
    store_rx: Receiver<StoreEvent>,

    /// Input edits forwarded to the controller
    edits_sent: u64,

    /// Rendered history
    pub messages: Vec<Message>,

    /// Contents of the input field
    pub input_text: String,

    /// A speech session is live
    pub listening: bool,

    /// Scroll the list to the newest entry on the next frame
    pub scroll_to_latest: bool,

    /// Controller has shut down
    pub closed: bool,
}

impl ChatViewState {
    pub fn new(handle: ControllerHandle) -> Self {
        // Subscribe first; duplicates from the overlap are dropped by index
        let store_rx = handle.store().subscribe();
        Self::with_subscription(handle, store_rx)
    }

    fn with_subscription(handle: ControllerHandle, store_rx: Receiver<StoreEvent>) -> Self {
        let messages = handle.history();

        Self {
            handle,
            store_rx,
            edits_sent: 0,
            messages,
            input_text: String::new(),
            listening: false,
            scroll_to_latest: true,
            closed: false,
        }
    }

    pub fn handle(&self) -> &ControllerHandle {
        &self.handle
    }

    pub fn speech_available(&self) -> bool {
        self.handle.speech_available()
    }

    /// Forward the edited input field
    pub fn edit_input(&mut self) {
        match self.handle.set_input(self.input_text.clone()) {
            Ok(()) => self.edits_sent += 1,
            Err(e) => warn!("Input edit not delivered: {}", e),
        }
    }

    /// Enter or the send button. A non-blank field is cleared right away;
    /// the controller empties its copy when it handles the submit.
    pub fn submit(&mut self) {
        match self.handle.submit() {
            Ok(()) if !self.input_text.trim().is_empty() => self.input_text.clear(),
            Ok(()) => {}
            Err(e) => warn!("Submit not delivered: {}", e),
        }
    }

    /// Mic button
    pub fn toggle_listening(&mut self) {
        let result = if self.listening {
            self.handle.stop_listening()
        } else {
            self.handle.start_listening()
        };

        if let Err(e) = result {
            warn!("Mic toggle not delivered: {}", e);
        }
    }

    pub fn shutdown(&mut self) {
        if !self.closed {
            debug!("Requesting controller shutdown");
            let _ = self.handle.shutdown();
        }
    }

    /// Apply pending controller and store events. Returns `true` if
    /// anything changed.
    pub fn poll_events(&mut self) -> bool {
        let mut changed = false;

        while let Some(event) = self.handle.try_recv_event() {
            changed = true;
            match event {
                ViewEvent::InputChanged { text, edits } => {
                    if edits >= self.edits_sent {
                        self.input_text = text;
                    } else {
                        trace!(edits, sent = self.edits_sent, "Input change predates local edits");
                    }
                }
                ViewEvent::ListeningChanged(listening) => self.listening = listening,
                ViewEvent::Shutdown => {
                    self.closed = true;
                    self.listening = false;
                }
            }
        }

        while let Ok(StoreEvent::Appended { index, message }) = self.store_rx.try_recv() {
            if index >= self.messages.len() {
                self.messages.push(message);
                self.scroll_to_latest = true;
                changed = true;
            }
        }

        changed
    }
}
