pub mod config;
pub mod controller;
pub mod dispatch;
pub mod messages;
pub mod speech;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ui;

pub use config::ChatConfig;
pub use controller::{ControllerCommand, ControllerHandle, ConversationController, ViewEvent};
pub use messages::{ConversationStore, Message, Role, StoreEvent};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FluentError {
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Speech recognition error: {0}")]
    SpeechError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for FluentError {
    fn from(e: std::io::Error) -> Self {
        FluentError::IOError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FluentError>;
