//! Outbound message dispatch
//!
//! `MessageDispatcher` performs the optimistic user append, sends the request
//! through a [`Responder`] on a tokio task, and applies completions to the
//! store in the order they finish. Failures are logged and never reach the
//! conversation.

pub mod http;

pub use http::HttpResponder;

use crate::messages::{ConversationStore, Message, Role};
use crate::{FluentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Status value marking a successful reply
pub const STATUS_SUCCESS: &str = "success";

/// Label used when a failed reply carries no message
pub const UNKNOWN_API_ERROR: &str = "Unknown error from API";

/// Request body: `{"message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Nested payload of a successful reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Response body as sent by the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatReply>,
}

impl ChatResponse {
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: None,
            data: Some(ChatReply {
                response: response.into(),
            }),
        }
    }

    pub fn failure(status: impl Into<String>, message: Option<&str>) -> Self {
        Self {
            status: status.into(),
            message: message.map(str::to_string),
            data: None,
        }
    }

    /// Extract the bot reply, or the protocol error the body describes
    pub fn into_reply(self) -> Result<String> {
        if self.status != STATUS_SUCCESS {
            return Err(FluentError::ProtocolError(
                self.message
                    .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string()),
            ));
        }

        self.data.map(|data| data.response).ok_or_else(|| {
            FluentError::ProtocolError("Malformed response body: missing data.response".to_string())
        })
    }
}

/// The remote end of a conversation
#[async_trait]
pub trait Responder: Send + Sync {
    /// Deliver one request and return the decoded response body.
    ///
    /// Transport failures (including non-2xx statuses) and undecodable
    /// bodies are errors; a decoded body with a failure status is not.
    async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// Completion of one dispatch
#[derive(Debug)]
pub struct DispatchOutcome {
    pub request_id: Uuid,
    pub result: Result<String>,
    pub elapsed_ms: u64,
}

pub struct MessageDispatcher {
    responder: Arc<dyn Responder>,
    store: ConversationStore,
    in_flight: JoinSet<DispatchOutcome>,
}

impl MessageDispatcher {
    pub fn new(responder: Arc<dyn Responder>, store: ConversationStore) -> Self {
        Self {
            responder,
            store,
            in_flight: JoinSet::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Append the user message and issue the request.
    ///
    /// Whitespace-only text is ignored and returns `None`. Must be called
    /// from within a tokio runtime.
    pub fn send(&mut self, text: &str) -> Option<Uuid> {
        if text.trim().is_empty() {
            debug!("Ignoring empty submit");
            return None;
        }

        self.store.append(Role::User, text);

        let request_id = Uuid::new_v4();
        let request = ChatRequest {
            message: text.to_string(),
        };
        let responder = Arc::clone(&self.responder);

        debug!(%request_id, chars = text.len(), "Dispatching message");

        self.in_flight.spawn(async move {
            let started = Instant::now();
            let result = match responder.respond(&request).await {
                Ok(response) => response.into_reply(),
                Err(e) => Err(e),
            };
            DispatchOutcome {
                request_id,
                result,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        });

        Some(request_id)
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for the next dispatch to finish. Cancel safe.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn join_next(&mut self) -> Option<std::result::Result<DispatchOutcome, JoinError>> {
        self.in_flight.join_next().await
    }

    /// Apply a finished dispatch to the store.
    ///
    /// Returns the bot message when one was appended.
    pub fn complete(
        &mut self,
        joined: std::result::Result<DispatchOutcome, JoinError>,
    ) -> Option<Message> {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                debug!("Dispatch cancelled");
                return None;
            }
            Err(e) => {
                error!("Dispatch task failed: {}", e);
                return None;
            }
        };

        match outcome.result {
            Ok(reply) => {
                info!(
                    request_id = %outcome.request_id,
                    elapsed_ms = outcome.elapsed_ms,
                    "Reply received"
                );
                Some(self.store.append(Role::Bot, reply))
            }
            Err(e) => {
                error!(
                    request_id = %outcome.request_id,
                    elapsed_ms = outcome.elapsed_ms,
                    "Dispatch failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Abort every in-flight request; their replies are never applied
    pub fn abort_all(&mut self) {
        if !self.in_flight.is_empty() {
            debug!(count = self.in_flight.len(), "Aborting in-flight dispatches");
        }
        self.in_flight.abort_all();
    }
}
