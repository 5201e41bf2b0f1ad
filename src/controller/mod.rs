//! Conversation controller
//!
//! Composition root for the chat view: owns the pending input, the speech
//! session, the silence debouncer and the dispatcher, and runs them from one
//! event loop.
//!
//! Inputs arrive as [`ControllerCommand`]s through a [`ControllerHandle`]
//! (keystrokes, submit, mic toggle) and as speech events from the facility.
//! Outputs are appends to the shared [`ConversationStore`] plus
//! [`ViewEvent`]s the rendering surface polls each frame.

mod debounce;

pub use debounce::SilenceDebouncer;

use crate::config::ChatConfig;
use crate::dispatch::{HttpResponder, MessageDispatcher, Responder};
use crate::messages::{ConversationStore, Message};
use crate::speech::{self, RecognitionConfig, SessionEvent, SpeechCaptureAdapter, SpeechFacility};
use crate::{FluentError, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Commands accepted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// The user edited the input field
    SetInput(String),

    /// Enter (without shift) or the send button
    Submit,

    /// Mic button: begin a speech session
    StartListening,

    /// Mic button while listening: end the speech session
    StopListening,

    /// Tear the controller down
    Shutdown,
}

/// Notifications for the rendering surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Pending input changed from a source other than a keystroke.
    ///
    /// `edits` counts the `SetInput` commands applied before the change.
    /// A view that has sent more edits than that is ahead of the event and
    /// should keep its own text.
    InputChanged { text: String, edits: u64 },

    /// Speech session started or ended
    ListeningChanged(bool),

    /// Controller has shut down
    Shutdown,
}

/// Handle for driving the controller from the UI
///
/// Clones share the view event queue; each event is delivered to one of them.
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: UnboundedSender<ControllerCommand>,
    view_rx: crossbeam_channel::Receiver<ViewEvent>,
    store: ConversationStore,
    speech_available: bool,
}

impl ControllerHandle {
    /// Send a command to the controller
    pub fn send_command(&self, cmd: ControllerCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| FluentError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn set_input(&self, text: impl Into<String>) -> Result<()> {
        self.send_command(ControllerCommand::SetInput(text.into()))
    }

    pub fn submit(&self) -> Result<()> {
        self.send_command(ControllerCommand::Submit)
    }

    pub fn start_listening(&self) -> Result<()> {
        self.send_command(ControllerCommand::StartListening)
    }

    pub fn stop_listening(&self) -> Result<()> {
        self.send_command(ControllerCommand::StopListening)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send_command(ControllerCommand::Shutdown)
    }

    /// Try to receive a view event
    pub fn try_recv_event(&self) -> Option<ViewEvent> {
        self.view_rx.try_recv().ok()
    }

    /// Shared conversation history
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn history(&self) -> Vec<Message> {
        self.store.history()
    }

    /// Whether the speech probe found a facility
    pub fn speech_available(&self) -> bool {
        self.speech_available
    }
}

pub struct ConversationController {
    store: ConversationStore,
    pending_input: String,
    input_edits: u64,
    speech: SpeechCaptureAdapter,
    debouncer: SilenceDebouncer,
    dispatcher: MessageDispatcher,
    command_rx: UnboundedReceiver<ControllerCommand>,
    speech_rx: UnboundedReceiver<SessionEvent>,
    view_tx: crossbeam_channel::Sender<ViewEvent>,
}

impl ConversationController {
    /// Create a controller with an explicit responder and speech facility
    pub fn new(
        config: &ChatConfig,
        responder: Arc<dyn Responder>,
        facility: SpeechFacility,
    ) -> (Self, ControllerHandle) {
        let (command_tx, command_rx) = unbounded_channel();
        let (speech_tx, speech_rx) = unbounded_channel();
        let (view_tx, view_rx) = crossbeam_channel::unbounded();

        let store = ConversationStore::with_greeting(config.conversation.greeting.clone());
        let speech = SpeechCaptureAdapter::new(
            facility,
            RecognitionConfig::from(&config.speech),
            speech_tx,
        );

        let handle = ControllerHandle {
            command_tx,
            view_rx,
            store: store.clone(),
            speech_available: speech.available(),
        };

        let controller = Self {
            dispatcher: MessageDispatcher::new(responder, store.clone()),
            store,
            pending_input: String::new(),
            input_edits: 0,
            speech,
            debouncer: SilenceDebouncer::new(config.silence_period()),
            command_rx,
            speech_rx,
            view_tx,
        };

        (controller, handle)
    }

    /// Create a controller talking HTTP and using whatever speech facility
    /// the host offers
    pub fn from_config(config: &ChatConfig) -> Result<(Self, ControllerHandle)> {
        config.validate()?;
        let responder = HttpResponder::new(&config.responder)?;
        let facility = speech::probe(&config.speech);
        Ok(Self::new(config, Arc::new(responder), facility))
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    pub fn debouncer(&self) -> &SilenceDebouncer {
        &self.debouncer
    }

    /// Apply one command. Returns `false` for `Shutdown`.
    pub fn handle_command(&mut self, cmd: ControllerCommand) -> bool {
        match cmd {
            ControllerCommand::SetInput(text) => {
                self.pending_input = text;
                self.input_edits += 1;
            }
            ControllerCommand::Submit => self.submit(),
            ControllerCommand::StartListening => {
                if self.speech.start() {
                    self.notify(ViewEvent::ListeningChanged(true));
                }
            }
            ControllerCommand::StopListening => {
                if self.speech.stop() {
                    self.notify(ViewEvent::ListeningChanged(false));
                }
            }
            ControllerCommand::Shutdown => return false,
        }
        true
    }

    /// Send the pending input if it has any non-whitespace content
    pub fn submit(&mut self) {
        if self.pending_input.trim().is_empty() {
            debug!("Nothing to submit");
            return;
        }

        self.debouncer.cancel();
        let text = std::mem::take(&mut self.pending_input);
        self.notify_input();
        self.dispatcher.send(&text);
    }

    fn on_speech(&mut self, event: SessionEvent) {
        let was_listening = self.speech.is_listening();

        if let Some(transcript) = self.speech.accept(event) {
            debug!(chars = transcript.len(), "Transcript received");
            self.pending_input = transcript;
            self.notify_input();
            self.debouncer.reset();
        }

        if was_listening && !self.speech.is_listening() {
            self.notify(ViewEvent::ListeningChanged(false));
        }
    }

    fn on_silence(&mut self) {
        debug!(
            quiet_ms = self.debouncer.quiet_period().as_millis() as u64,
            "Silence elapsed, submitting"
        );
        self.submit();
    }

    fn notify_input(&self) {
        self.notify(ViewEvent::InputChanged {
            text: self.pending_input.clone(),
            edits: self.input_edits,
        });
    }

    fn notify(&self, event: ViewEvent) {
        if self.view_tx.send(event).is_err() {
            debug!("View event dropped, no receiver");
        }
    }

    /// Run the event loop until `Shutdown` or every handle is dropped
    pub async fn run(mut self) {
        info!(
            speech_available = self.speech.available(),
            history = self.store.len(),
            "Conversation controller started"
        );

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command) {
                                info!("Controller shutdown requested");
                                break;
                            }
                        }
                        None => {
                            info!("All controller handles dropped");
                            break;
                        }
                    }
                }
                Some(event) = self.speech_rx.recv() => self.on_speech(event),
                () = self.debouncer.expired() => self.on_silence(),
                Some(joined) = self.dispatcher.join_next(), if self.dispatcher.has_in_flight() => {
                    self.dispatcher.complete(joined);
                }
            }
        }

        self.teardown();
    }

    fn teardown(&mut self) {
        self.speech.stop();
        self.debouncer.cancel();
        self.dispatcher.abort_all();
        self.notify(ViewEvent::Shutdown);
        info!("Conversation controller stopped");
    }

    /// Run the controller on its own thread with a single-threaded runtime
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let handle = thread::Builder::new()
            .name("conversation".to_string())
            .spawn(move || runtime.block_on(self.run()))?;

        Ok(handle)
    }
}
