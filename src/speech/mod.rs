//! Speech input
//!
//! This module provides:
//! - The `SpeechRecognizer` trait implemented by speech facilities
//! - `SpeechFacility`, the capability probe result (`Available` / `Unavailable`)
//! - `SpeechCaptureAdapter`, the Idle/Listening session state machine
//! - A local Whisper recognizer (feature `speech-io`)

pub mod capture;
#[cfg(feature = "speech-io")]
pub mod audio;
#[cfg(feature = "speech-io")]
pub mod whisper;

pub use capture::{SpeechCaptureAdapter, SpeechSession};
#[cfg(feature = "speech-io")]
pub use whisper::WhisperRecognizer;

use crate::config::SpeechConfig;
use crate::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Settings handed to the facility when a session starts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
        }
    }
}

impl From<&SpeechConfig> for RecognitionConfig {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// Events a facility reports for a running session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Hypothesis for the most recent segment (full text, not a delta)
    Transcript(String),
    /// Facility-reported failure; the session is over
    Error(String),
    /// The facility finished the session on its own
    Ended,
}

/// A [`SpeechEvent`] tagged with the session that produced it
#[derive(Clone, Debug)]
pub struct SessionEvent {
    pub session: u64,
    pub event: SpeechEvent,
}

/// Callback handle given to a facility for one session.
///
/// Cheap to clone and `Send`, so capture threads can hold their own copy.
/// Every method returns `false` once the controller is gone.
#[derive(Clone, Debug)]
pub struct SpeechEventSink {
    session: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl SpeechEventSink {
    pub fn new(session: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn transcript(&self, text: impl Into<String>) -> bool {
        self.emit(SpeechEvent::Transcript(text.into()))
    }

    pub fn error(&self, detail: impl Into<String>) -> bool {
        self.emit(SpeechEvent::Error(detail.into()))
    }

    pub fn ended(&self) -> bool {
        self.emit(SpeechEvent::Ended)
    }

    fn emit(&self, event: SpeechEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// A start/stop-able speech recognition facility
pub trait SpeechRecognizer: Send {
    /// Begin recognizing; events for this session go to `sink`
    fn start(&mut self, config: &RecognitionConfig, sink: SpeechEventSink) -> Result<()>;

    /// Stop the running session, if any
    fn stop(&mut self);
}

/// Result of probing the host for speech support
pub enum SpeechFacility {
    Available(Box<dyn SpeechRecognizer>),
    Unavailable,
}

impl SpeechFacility {
    pub fn is_available(&self) -> bool {
        matches!(self, SpeechFacility::Available(_))
    }
}

impl std::fmt::Debug for SpeechFacility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechFacility::Available(_) => write!(f, "Available"),
            SpeechFacility::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// Probe the host for a speech facility
pub fn probe(config: &SpeechConfig) -> SpeechFacility {
    if !config.enabled {
        info!("Speech input disabled by configuration");
        return SpeechFacility::Unavailable;
    }

    probe_local(config)
}

#[cfg(feature = "speech-io")]
fn probe_local(config: &SpeechConfig) -> SpeechFacility {
    match whisper::WhisperRecognizer::new(config) {
        Ok(recognizer) => {
            info!("Speech input available (Whisper)");
            SpeechFacility::Available(Box::new(recognizer))
        }
        Err(e) => {
            warn!("Speech input unavailable: {}", e);
            SpeechFacility::Unavailable
        }
    }
}

#[cfg(not(feature = "speech-io"))]
fn probe_local(_config: &SpeechConfig) -> SpeechFacility {
    warn!("Speech input unavailable: built without the speech-io feature");
    SpeechFacility::Unavailable
}
