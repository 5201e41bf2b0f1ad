//! Speech session state machine
//!
//! Wraps the probed [`SpeechFacility`] and tracks the single recognition
//! session a controller may have. Events from sessions that are no longer
//! current are dropped here, so the controller only ever sees transcripts
//! from the live session.

use super::{RecognitionConfig, SessionEvent, SpeechEvent, SpeechEventSink, SpeechFacility};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace, warn};

/// Recognition session state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpeechSession {
    #[default]
    Idle,
    Listening {
        id: u64,
    },
}

impl SpeechSession {
    pub fn is_listening(&self) -> bool {
        matches!(self, SpeechSession::Listening { .. })
    }
}

impl std::fmt::Display for SpeechSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechSession::Idle => write!(f, "Idle"),
            SpeechSession::Listening { id } => write!(f, "Listening({})", id),
        }
    }
}

pub struct SpeechCaptureAdapter {
    facility: SpeechFacility,
    config: RecognitionConfig,
    session: SpeechSession,
    next_session: u64,
    events_tx: UnboundedSender<SessionEvent>,
}

impl SpeechCaptureAdapter {
    pub fn new(
        facility: SpeechFacility,
        config: RecognitionConfig,
        events_tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            facility,
            config,
            session: SpeechSession::Idle,
            next_session: 0,
            events_tx,
        }
    }

    /// Capability probe result
    pub fn available(&self) -> bool {
        self.facility.is_available()
    }

    pub fn session(&self) -> SpeechSession {
        self.session
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_listening()
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Begin a Listening session.
    ///
    /// Returns `true` when a new session started. Does nothing when the
    /// facility is unavailable or a session is already running.
    pub fn start(&mut self) -> bool {
        if self.session.is_listening() {
            debug!("Speech session already listening");
            return false;
        }

        let recognizer = match &mut self.facility {
            SpeechFacility::Available(recognizer) => recognizer,
            SpeechFacility::Unavailable => {
                debug!("Speech facility unavailable, ignoring start");
                return false;
            }
        };

        self.next_session += 1;
        let id = self.next_session;
        let sink = SpeechEventSink::new(id, self.events_tx.clone());

        match recognizer.start(&self.config, sink) {
            Ok(()) => {
                self.session = SpeechSession::Listening { id };
                info!(session = id, language = %self.config.language, "Speech session started");
                true
            }
            Err(e) => {
                warn!(session = id, "Failed to start speech session: {}", e);
                false
            }
        }
    }

    /// End the current session. Returns `true` if one was running.
    pub fn stop(&mut self) -> bool {
        let SpeechSession::Listening { id } = self.session else {
            return false;
        };

        if let SpeechFacility::Available(recognizer) = &mut self.facility {
            recognizer.stop();
        }
        self.session = SpeechSession::Idle;
        info!(session = id, "Speech session stopped");
        true
    }

    /// Route a facility event through the session state machine.
    ///
    /// Returns the transcript when the event is a transcript of the live
    /// session. Errors and completion return the adapter to Idle.
    pub fn accept(&mut self, event: SessionEvent) -> Option<String> {
        match self.session {
            SpeechSession::Listening { id } if id == event.session => {}
            _ => {
                trace!(session = event.session, current = %self.session, "Discarding stale speech event");
                return None;
            }
        }

        match event.event {
            SpeechEvent::Transcript(text) => Some(text),
            SpeechEvent::Error(detail) => {
                error!(session = event.session, "Speech recognition error: {}", detail);
                self.finish();
                None
            }
            SpeechEvent::Ended => {
                debug!(session = event.session, "Speech session ended by facility");
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        if let SpeechFacility::Available(recognizer) = &mut self.facility {
            recognizer.stop();
        }
        self.session = SpeechSession::Idle;
    }
}
